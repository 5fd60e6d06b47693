//! Legacy type family
//!
//! The identifier, regex, binary, map and ordered-document types that
//! pre-date the reference implementation, together with the legacy decode
//! entry point. Generic values decoded through [`unmarshal`] use native
//! integers, native time, `Vec<Value>` for arrays and legacy identifiers.

mod object_id;

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::codec::{Codec, Unmarshal};
use crate::encode::Marshal;
use crate::error::{DecodeError, EncodeError};
use crate::policy::Family;
use crate::value::Value;

pub use object_id::ObjectId;

/// A BSON regular expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RegEx {
    pub pattern: String,
    pub options: String,
}

impl RegEx {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// Binary data with its subtype byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Binary {
    pub kind: u8,
    pub data: Vec<u8>,
}

/// Unordered document. Iterates, and therefore encodes, in ascending key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct M(BTreeMap<String, Value>);

impl M {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Deref for M {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for M {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, Value>> for M {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for M {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for M {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A single entry of an ordered document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocElem {
    pub name: String,
    pub value: Value,
}

/// Ordered document. Keys may repeat; order is preserved exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct D(Vec<DocElem>);

impl D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.push(DocElem {
            name: name.into(),
            value: value.into(),
        });
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// Collapse into an unordered map; later duplicates win.
    pub fn to_map(&self) -> M {
        self.0
            .iter()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }
}

impl Deref for D {
    type Target = Vec<DocElem>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for D {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<DocElem>> for D {
    fn from(elems: Vec<DocElem>) -> Self {
        Self(elems)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for D {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| DocElem {
                    name: k.into(),
                    value: v.into(),
                })
                .collect(),
        )
    }
}

/// Encode `value` as a BSON document.
pub fn marshal<T: Marshal + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    crate::encode::marshal(value)
}

/// Decode `data` into `out` through the legacy entry point.
///
/// `out` is left untouched when decoding fails.
pub fn unmarshal<T: Unmarshal>(data: &[u8], out: &mut T) -> Result<(), DecodeError> {
    Codec::default().unmarshal(Family::Legacy, data, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_m_orders_keys() {
        let m: M = [("b", 1), ("a", 2)].into_iter().collect();
        let keys: Vec<_> = m.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_d_keeps_duplicates_in_order() {
        let mut d = D::new();
        d.push("x", 1);
        d.push("y", 2);
        d.push("x", 3);
        assert_eq!(d.len(), 3);
        assert_eq!(d.get("x"), Some(&Value::Int32(1)));
        assert_eq!(d.to_map().get("x"), Some(&Value::Int32(3)));
    }
}
