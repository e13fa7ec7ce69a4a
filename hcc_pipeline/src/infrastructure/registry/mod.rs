//! # Document Registry Adapters
//!
//! `postgres` is the production `DocumentRegistry` (§4.1); `in_memory` is a
//! `Mutex<HashMap<...>>` test double shared by every stage's unit tests and
//! by `hcc-watcher`/batch-mode smoke tests.

pub mod in_memory;
pub mod postgres;
