//! Pagination and filtering value objects for `DocumentRegistry::list`.

use serde::{Deserialize, Serialize};

use crate::entities::document::DocumentStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub skip: u32,
    pub limit: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(skip: u32, limit: u32) -> Self {
        Self {
            skip,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Filters applied by `DocumentRegistry::list` and `CountByStatus`. Both
/// fields are optional narrowing predicates; `None` means "no filter on
/// this dimension."
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub skip: u32,
    pub limit: u32,
}
