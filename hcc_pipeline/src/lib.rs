//! # HCC Pipeline
//!
//! The application and infrastructure layers for the HCC clinical document
//! pipeline. Pure business logic lives in `hcc_domain`; this crate wires that
//! logic to Postgres, RabbitMQ, blob storage, an LLM endpoint, and HTTP, and
//! ships the five binaries (`hcc-extractor`, `hcc-analyzer`, `hcc-validator`,
//! `hcc-gateway`, `hcc-watcher`) that run them.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              hcc-bootstrap                   │
//! │   CLI parsing, config, logging, shutdown     │
//! └─────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────┐
//! │              application                     │
//! │  stage handlers, gateway use cases, LLM glue │
//! └─────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────┐
//! │              infrastructure                  │
//! │ registry · artifact_store · bus · llm · http │
//! └─────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────┐
//! │                hcc_domain                     │
//! │   entities, value objects, ports, services    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod application;
pub mod infrastructure;
