//! Domain services: business logic that spans more than one entity and
//! doesn't need I/O to execute. Both modules here are pure functions over
//! in-memory snapshots — loading those snapshots from a CSV file or a
//! database is an infrastructure concern (see `hcc-pipeline`).

pub mod extraction;
pub mod hcc_lookup;
pub mod rules_engine;

pub use extraction::{parse_clinical_metadata, ClinicalMetadata};
pub use hcc_lookup::HccLookup;
pub use rules_engine::{RulesEngine, ValidationRule};
