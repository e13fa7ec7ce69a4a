//! # LLM Client Port
//!
//! The LLM is an opaque request/response oracle (§4.6), invoked only by the
//! Extractor and Analyzer. The port is deliberately narrow — one method,
//! one prompt string in, one completion string out — because every
//! protocol detail (generation parameters, tolerant JSON extraction,
//! `NaN`/`nan` sanitization) is the caller's concern, not the transport's:
//! keeping those concerns in the application layer means the tolerant
//! parser can be unit-tested without a fake HTTP server.

use async_trait::async_trait;

use crate::error::Result;

/// Fixed generation parameters for every LLM call, per §4.6. A single
/// constant set rather than a per-call builder, since the spec doesn't
/// vary them by use site.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Submits `prompt` and returns the raw completion text. Implementers
    /// apply a provider-level timeout and surface any failure (network,
    /// timeout, non-2xx response) as `HccError::LlmFailure` — callers
    /// never distinguish the reason, only that the oracle failed, per the
    /// "degrade, never fail the document" policy.
    async fn complete(&self, prompt: &str, params: GenerationParams) -> Result<String>;
}
