pub mod condition;
pub mod document;
pub mod hcc_entry;

pub use condition::{Condition, ValidationRuleResult};
pub use document::{Document, DocumentStatus};
pub use hcc_entry::HccEntry;
