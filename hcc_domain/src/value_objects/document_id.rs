//! # Document Identifier
//!
//! Type-safe wrapper around a UUID so that a document id can never be
//! confused with any other UUID flowing through the system (a message id, a
//! processing id). The spec mandates UUIDs for document identity, so unlike
//! the sortable-ULID identity pattern this crate's ambient stack otherwise
//! favors, `DocumentId` is a thin newtype rather than a timestamp-carrying
//! identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::HccError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = HccError;

    /// Parses a document id from its string form, returning
    /// `HccError::InvalidMessage` on malformed input. Stage workers rely on
    /// this to implement the "malformed UUID in message" edge case: the
    /// message is logged and dropped, never propagated as a document
    /// failure, since there is no document to fail.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| HccError::InvalidMessage(format!("invalid document_id '{s}': {e}")))
    }
}

impl From<Uuid> for DocumentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<DocumentId> for Uuid {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_string() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_uuid() {
        let err = "not-a-uuid".parse::<DocumentId>().unwrap_err();
        assert!(matches!(err, HccError::InvalidMessage(_)));
    }
}
