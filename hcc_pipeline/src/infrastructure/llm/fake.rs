//! Deterministic `LlmClient` test doubles, selected in local development and
//! tests in place of the HTTP backend (§4.6: "one deterministic mock backend
//! ... selected by configuration rather than compile-time feature flags").

use async_trait::async_trait;

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::llm_client::GenerationParams;
use hcc_domain::repositories::LlmClient;

/// Always returns a fixed completion string, most often an empty
/// `{"conditions": []}` for tests that want LLM-assisted extraction to
/// contribute nothing.
pub struct FixedLlm {
    completion: String,
}

impl FixedLlm {
    pub fn new(completion: impl Into<String>) -> Self {
        Self { completion: completion.into() }
    }

    pub fn empty() -> Self {
        Self::new(r#"{"conditions": []}"#)
    }
}

#[async_trait]
impl LlmClient for FixedLlm {
    async fn complete(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
        Ok(self.completion.clone())
    }
}

/// Always fails, for exercising the "LLM failure is never fatal" paths (S3
/// in §8).
pub struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn complete(&self, _prompt: &str, _params: GenerationParams) -> Result<String> {
        Err(HccError::LlmFailure("simulated provider outage".to_string()))
    }
}
