//! Legacy-family identifier
//!
//! A legacy `ObjectId` either holds exactly 12 bytes or is empty. The empty
//! identifier is the type's zero value: it is what a null or absent field
//! decodes to, and it is skipped by `omitempty`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{DecodeError, EncodeError};

/// A 12-byte identifier with a 24-character lowercase hex form.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    bytes: Option<[u8; 12]>,
}

impl ObjectId {
    /// Generate a fresh identifier.
    ///
    /// Layout: 4-byte big-endian seconds, 3-byte machine id, 2-byte
    /// big-endian process id, 3-byte big-endian counter.
    pub fn new() -> Self {
        let secs = Utc::now().timestamp() as u32;
        let machine = machine_id();
        let pid = (std::process::id() & 0xffff) as u16;
        let counter = next_counter();

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..7].copy_from_slice(&machine);
        bytes[7..9].copy_from_slice(&pid.to_be_bytes());
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self::from_bytes(bytes)
    }

    /// Identifier carrying only a timestamp, for range queries on `_id`.
    pub fn from_time(time: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&(time.timestamp() as u32).to_be_bytes());
        Self::from_bytes(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self { bytes: Some(bytes) }
    }

    /// Parse the canonical 24-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        if s.len() != 24 {
            return Err(DecodeError::InvalidObjectIdHex(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| DecodeError::InvalidObjectIdHex(s.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Same as [`from_hex`](Self::from_hex), named like the current family's parser.
    pub fn parse_str(s: impl AsRef<str>) -> Result<Self, DecodeError> {
        Self::from_hex(s.as_ref())
    }

    /// Whether `s` is a valid hex identifier.
    pub fn is_hex(s: &str) -> bool {
        Self::from_hex(s).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_none()
    }

    /// The raw bytes, or `None` for the empty identifier.
    pub fn bytes(&self) -> Option<[u8; 12]> {
        self.bytes
    }

    /// Lowercase hex form; empty for the empty identifier.
    pub fn hex(&self) -> String {
        self.bytes.map(hex::encode).unwrap_or_default()
    }

    /// Creation time encoded in the first four bytes.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let b = self.bytes?;
        let secs = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        DateTime::from_timestamp(i64::from(secs), 0)
    }

    pub fn machine(&self) -> Option<[u8; 3]> {
        self.bytes.map(|b| [b[4], b[5], b[6]])
    }

    pub fn pid(&self) -> Option<u16> {
        self.bytes.map(|b| u16::from_be_bytes([b[7], b[8]]))
    }

    pub fn counter(&self) -> Option<u32> {
        self.bytes.map(|b| u32::from_be_bytes([0, b[9], b[10], b[11]]))
    }
}

fn machine_id() -> [u8; 3] {
    static MACHINE_ID: OnceLock<[u8; 3]> = OnceLock::new();
    *MACHINE_ID.get_or_init(|| {
        let mut id = [0u8; 3];
        match hostname::get() {
            Ok(name) if !name.is_empty() => {
                let digest = Sha256::digest(name.as_encoded_bytes());
                id.copy_from_slice(&digest[..3]);
            }
            _ => rand::thread_rng().fill(&mut id),
        }
        id
    })
}

fn next_counter() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER
        .get_or_init(|| AtomicU32::new(rand::random()))
        .fetch_add(1, Ordering::SeqCst)
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectIdHex({:?})", self.hex())
    }
}

impl FromStr for ObjectId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<bson::oid::ObjectId> for ObjectId {
    fn from(oid: bson::oid::ObjectId) -> Self {
        Self::from_bytes(oid.bytes())
    }
}

impl TryFrom<ObjectId> for bson::oid::ObjectId {
    type Error = EncodeError;

    fn try_from(id: ObjectId) -> Result<Self, Self::Error> {
        id.bytes
            .map(bson::oid::ObjectId::from_bytes)
            .ok_or(EncodeError::InvalidObjectId { len: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "507f1f77bcf86cd799439011";

    #[test]
    fn test_hex_round_trip() {
        let id = ObjectId::from_hex(HEX).unwrap();
        assert_eq!(id.hex(), HEX);
        assert_eq!(id.to_string(), HEX);
        assert_eq!(format!("{id:?}"), format!("ObjectIdHex(\"{HEX}\")"));
        assert_eq!(HEX.parse::<ObjectId>().unwrap(), id);
        assert_eq!(ObjectId::parse_str(HEX).unwrap(), id);
    }

    #[test]
    fn test_same_bytes_as_current_family() {
        let legacy = ObjectId::from_hex(HEX).unwrap();
        let current = bson::oid::ObjectId::parse_str(HEX).unwrap();
        assert_eq!(legacy.bytes(), Some(current.bytes()));
        assert_eq!(ObjectId::from(current), legacy);
        assert_eq!(bson::oid::ObjectId::try_from(legacy).unwrap(), current);
    }

    #[test]
    fn test_rejects_bad_hex() {
        assert!(ObjectId::from_hex("").is_err());
        assert!(ObjectId::from_hex("507f1f77bcf86cd79943901").is_err());
        assert!(ObjectId::from_hex("507f1f77bcf86cd79943901z").is_err());
        assert!(!ObjectId::is_hex("hello"));
        assert!(ObjectId::is_hex(HEX));
    }

    #[test]
    fn test_empty_identifier() {
        let id = ObjectId::default();
        assert!(id.is_empty());
        assert_eq!(id.hex(), "");
        assert_eq!(id.timestamp(), None);
        assert!(bson::oid::ObjectId::try_from(id).is_err());
    }

    #[test]
    fn test_new_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.machine(), b.machine());
        assert_eq!(a.pid(), b.pid());
        assert_eq!(a.pid(), Some((std::process::id() & 0xffff) as u16));
    }

    #[test]
    fn test_accessors() {
        let id = ObjectId::from_hex(HEX).unwrap();
        assert_eq!(id.timestamp().unwrap().timestamp(), 0x507f1f77);
        assert_eq!(id.machine(), Some([0xbc, 0xf8, 0x6c]));
        assert_eq!(id.pid(), Some(0xd799));
        assert_eq!(id.counter(), Some(0x439011));
    }

    #[test]
    fn test_from_time_zeroes_tail() {
        let t = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let id = ObjectId::from_time(t);
        assert_eq!(id.timestamp(), Some(t));
        assert_eq!(&id.bytes().unwrap()[4..], &[0u8; 8]);
    }

    #[test]
    fn test_ordering_by_bytes() {
        let low = ObjectId::from_bytes([0; 12]);
        let high = ObjectId::from_bytes([0xff; 12]);
        assert!(ObjectId::default() < low);
        assert!(low < high);
    }
}
