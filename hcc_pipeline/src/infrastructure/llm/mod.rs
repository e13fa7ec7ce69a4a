//! # LLM Client Adapters
//!
//! `http_client` is the production `LlmClient` over a reqwest HTTP transport
//! (§4.6, §7.2); `fake` provides fixed and failing test doubles shared by
//! the Extractor and Analyzer's unit tests.

pub mod fake;
pub mod http_client;
