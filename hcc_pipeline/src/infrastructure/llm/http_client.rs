//! # HTTP LLM Client
//!
//! Production `LlmClient` (§4.6): a single JSON request/response call
//! against a configured endpoint and API key, with a provider-level
//! timeout. Any failure — network, timeout, non-2xx — is flattened to
//! `HccError::LlmFailure`; callers never distinguish why, only that the
//! oracle failed.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::llm_client::GenerationParams;
use hcc_domain::repositories::LlmClient;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    completion: String,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(endpoint: String, api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HccError::Configuration(format!("could not build LLM HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| HccError::LlmFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HccError::LlmFailure(format!("LLM endpoint returned status {}", response.status())));
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| HccError::LlmFailure(e.to_string()))?;
        Ok(parsed.completion)
    }
}
