//! # Artifact Store Adapters
//!
//! `local` backs the filesystem directly for on-prem/dev deployments;
//! `object_store_backend` unifies S3 and GCS behind the `object_store` crate
//! so both clouds share one `ArtifactStore` implementation, selected at
//! startup by `ArtifactBackend` (§4.2, §7.2).

pub mod local;
pub mod object_store_backend;
