//! Typed LLM client adapter.
//!
//! The pipeline talks to a provider through the [`LlmClient`] trait:
//! `generate` for page text and `embed` for index vectors. Errors are
//! classified at this seam (auth, rate limit, transient, malformed output,
//! cancelled) so the orchestrator's dispositions stay mechanical.

pub mod http;
pub mod mock;
pub mod retry;

pub use http::HttpLlmClient;
pub use mock::MockLlmClient;
pub use retry::generate_with_retry;

use async_trait::async_trait;

use crate::core::errors::Result;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// User prompt text
    pub prompt: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    /// Build a request with no system prompt.
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature,
        }
    }

    /// Attach a system prompt.
    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Typed request/response interface to an LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate text for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Embed text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Provider name recorded in embedding provenance.
    fn provider(&self) -> &str;

    /// Generation model name.
    fn model(&self) -> &str;

    /// Embedding model name recorded in embedding provenance.
    fn embedding_model(&self) -> &str;
}
