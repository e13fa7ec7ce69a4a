//! Value objects: small, immutable, comparison-by-value types used
//! throughout the domain and infrastructure layers.

pub mod document_id;
pub mod icd_code;
pub mod pagination;
pub mod storage_location;

pub use document_id::DocumentId;
pub use pagination::{DocumentFilter, Page, Pagination};
pub use storage_location::{StorageKind, StorageLocation};
