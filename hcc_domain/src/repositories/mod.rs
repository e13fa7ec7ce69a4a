//! # Collaborator Ports
//!
//! Trait interfaces the pipeline depends on but does not implement. Every
//! concrete adapter (Postgres, RabbitMQ, local/S3/GCS blobs, an LLM HTTP
//! endpoint) lives in `hcc-pipeline`'s infrastructure layer; domain and
//! application code hold only `Arc<dyn Trait>` references to these ports,
//! per the redesign note on replacing singleton globals with explicit
//! collaborator interfaces passed into each worker's constructor.

pub mod artifact_store;
pub mod document_registry;
pub mod hcc_reference;
pub mod llm_client;
pub mod message_bus;

pub use artifact_store::ArtifactStore;
pub use document_registry::DocumentRegistry;
pub use hcc_reference::HccReferenceProvider;
pub use llm_client::LlmClient;
pub use message_bus::MessageBus;
