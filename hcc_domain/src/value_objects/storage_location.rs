//! Storage location value object: which backend a blob lives in, and its
//! key within that backend. Immutable after a document is created.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    S3,
    Gcs,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::S3 => "s3",
            StorageKind::Gcs => "gcs",
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = crate::error::HccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" => Ok(StorageKind::S3),
            "gcs" => Ok(StorageKind::Gcs),
            other => Err(crate::error::HccError::Configuration(format!(
                "unknown storage kind '{other}'"
            ))),
        }
    }
}

/// Where a blob lives: the backend and its key within that backend.
/// Keys take the form `"<uuid>/<filename>"` as produced by the artifact
/// store's `Store` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub kind: StorageKind,
    pub path: String,
}

impl StorageLocation {
    pub fn new(kind: StorageKind, path: impl Into<String>) -> Self {
        Self { kind, path: path.into() }
    }
}
