//! # Infrastructure Adapters
//!
//! Concrete implementations of `hcc_domain`'s collaborator ports. Every
//! module here owns exactly one of the five `hcc_domain::repositories`
//! traits plus the HTTP gateway surface; application code only ever sees
//! `Arc<dyn Trait>`.

pub mod artifact_store;
pub mod bus;
pub mod hcc_reference;
pub mod http;
pub mod llm;
pub mod registry;
pub mod wiring;
