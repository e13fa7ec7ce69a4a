//! # HCC Domain
//!
//! Entities, value objects, wire events, and collaborator ports for the HCC
//! extraction pipeline. This crate is pure business logic: it knows the
//! shape of a [`Document`](entities::Document) and a
//! [`Condition`](entities::Condition), how status transitions are allowed,
//! how ICD-10 codes normalize, and how the rules engine and HCC lookup
//! behave — but nothing about Postgres, RabbitMQ, or an LLM HTTP endpoint.
//!
//! ## Layout
//!
//! - `entities` — `Document`, `Condition`, `HccEntry`.
//! - `value_objects` — small immutable types (`DocumentId`, `StorageLocation`,
//!   `Pagination`, ICD normalization helpers).
//! - `events` — the wire schema for broker messages (§6.2).
//! - `services` — pure domain logic that doesn't belong to one entity: the
//!   rules engine and the HCC lookup snapshot.
//! - `repositories` — collaborator ports (`DocumentRegistry`, `ArtifactStore`,
//!   `MessageBus`, `LlmClient`). Every implementation lives in the
//!   infrastructure layer of the `hcc-pipeline` crate; domain and
//!   application code depend only on these traits.
//! - `error` — the single error enum spanning the crate.

pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use error::{HccError, Result};
