//! Decode state threaded through the recursion
//!
//! A [`DecodeContext`] carries the entry family, the document representation
//! locked for the current subtree, the nesting depth and the configured
//! options. It is a small `Copy` value; descending into a child produces a
//! new context and never mutates the parent's.

use std::fmt;

use tracing::trace;

use crate::error::DecodeError;
use crate::policy::{Destination, Family};

/// Default bound on document nesting.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Tunables applied to every decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Deepest nesting accepted below the root document.
    pub max_depth: usize,
    /// Replace invalid UTF-8 in generic string values instead of failing.
    pub lossy_utf8: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            lossy_utf8: false,
        }
    }
}

/// In-memory representation chosen for embedded documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// `legacy::M`
    M,
    /// `legacy::D`
    D,
    /// `current::Map`
    Map,
    /// `current::Document`
    Document,
}

impl DocumentKind {
    /// Representation used when nothing above has locked one.
    pub fn default_for(family: Family) -> Self {
        match family {
            Family::Legacy => DocumentKind::M,
            Family::Current => DocumentKind::Document,
        }
    }

    pub fn family(self) -> Family {
        match self {
            DocumentKind::M | DocumentKind::D => Family::Legacy,
            DocumentKind::Map | DocumentKind::Document => Family::Current,
        }
    }

    pub fn is_ordered(self) -> bool {
        matches!(self, DocumentKind::D | DocumentKind::Document)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::M => "legacy::M",
            DocumentKind::D => "legacy::D",
            DocumentKind::Map => "current::Map",
            DocumentKind::Document => "current::Document",
        };
        f.write_str(name)
    }
}

/// Where a decode is in the tree and which representations it must use.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    family: Family,
    documents: Option<DocumentKind>,
    depth: usize,
    options: DecodeOptions,
}

impl DecodeContext {
    pub fn new(family: Family, options: DecodeOptions) -> Self {
        Self {
            family,
            documents: None,
            depth: 0,
            options,
        }
    }

    /// The entry point's family.
    pub fn family(&self) -> Family {
        self.family
    }

    /// The locked document representation, if any.
    pub fn documents(&self) -> Option<DocumentKind> {
        self.documents
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Representation for the next embedded document: the lock, or the entry default.
    pub fn document_kind(&self) -> DocumentKind {
        self.documents
            .unwrap_or_else(|| DocumentKind::default_for(self.family))
    }

    /// Lock `kind` for this subtree. The first lock wins.
    pub fn lock(&self, kind: DocumentKind) -> Self {
        if self.documents.is_some() {
            return *self;
        }
        trace!(
            "Locked documents to {} at depth {} ({} entry)",
            kind, self.depth, self.family
        );
        Self {
            documents: Some(kind),
            ..*self
        }
    }

    /// Context for a child document or array one level down.
    pub fn descend(&self) -> Result<Self, DecodeError> {
        let depth = self.depth + 1;
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded(self.options.max_depth));
        }
        Ok(Self { depth, ..*self })
    }

    /// Destination for structurally typed slots.
    pub fn structural(&self) -> Destination {
        Destination::structural(self.family)
    }

    /// Destination for family-agnostic slots.
    pub fn generic(&self) -> Destination {
        Destination::generic(self.family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lock_wins() {
        let ctx = DecodeContext::new(Family::Legacy, DecodeOptions::default());
        assert_eq!(ctx.document_kind(), DocumentKind::M);

        let locked = ctx.lock(DocumentKind::Map);
        assert_eq!(locked.documents(), Some(DocumentKind::Map));
        assert_eq!(locked.lock(DocumentKind::D).document_kind(), DocumentKind::Map);
        assert_eq!(ctx.documents(), None);
    }

    #[test]
    fn test_descend_respects_max_depth() {
        let options = DecodeOptions {
            max_depth: 2,
            ..Default::default()
        };
        let ctx = DecodeContext::new(Family::Current, options);
        let one = ctx.descend().unwrap();
        let two = one.descend().unwrap();
        assert_eq!(two.depth(), 2);
        assert_eq!(two.descend().unwrap_err(), DecodeError::DepthExceeded(2));
    }

    #[test]
    fn test_defaults_per_family() {
        assert_eq!(DocumentKind::default_for(Family::Legacy), DocumentKind::M);
        assert_eq!(
            DocumentKind::default_for(Family::Current),
            DocumentKind::Document
        );
        assert!(DocumentKind::D.is_ordered());
        assert_eq!(DocumentKind::Map.family(), Family::Current);
    }
}
