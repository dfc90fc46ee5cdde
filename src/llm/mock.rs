//! Scripted LLM client for tests.
//!
//! Responses are selected by prompt substring, falling back to a default.
//! Embeddings are deterministic hash-based pseudo-vectors so retrieval tests
//! behave identically across runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::{OyaError, Result};
use crate::llm::{GenerationRequest, LlmClient};

/// Embedding dimensions used by the mock.
pub const MOCK_DIMENSIONS: usize = 64;

type ErrorFactory = Box<dyn Fn() -> OyaError + Send + Sync>;

/// Deterministic, scriptable [`LlmClient`] implementation.
pub struct MockLlmClient {
    default_response: String,
    responses: Vec<(String, String)>,
    fail_first: usize,
    error_factory: Option<ErrorFactory>,
    generate_count: AtomicUsize,
    embed_count: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    /// Create a mock that answers every prompt with an empty page.
    pub fn new() -> Self {
        Self {
            default_response: String::new(),
            responses: Vec::new(),
            fail_first: 0,
            error_factory: None,
            generate_count: AtomicUsize::new(0),
            embed_count: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Set the response used when no pattern matches.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Answer prompts containing `pattern` with `response`. Patterns are
    /// checked in registration order.
    pub fn with_response_for(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.responses.push((pattern.into(), response.into()));
        self
    }

    /// Fail the first `count` generate calls with errors from `factory`.
    pub fn failing_first<F>(mut self, count: usize, factory: F) -> Self
    where
        F: Fn() -> OyaError + Send + Sync + 'static,
    {
        self.fail_first = count;
        self.error_factory = Some(Box::new(factory));
        self
    }

    /// Number of generate calls observed.
    pub fn generate_calls(&self) -> usize {
        self.generate_count.load(Ordering::SeqCst)
    }

    /// Number of embed calls observed.
    pub fn embed_calls(&self) -> usize {
        self.embed_count.load(Ordering::SeqCst)
    }

    /// Every prompt passed to `generate`, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let call = self.generate_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        if call < self.fail_first {
            if let Some(factory) = &self.error_factory {
                return Err(factory());
            }
        }

        for (pattern, response) in &self.responses {
            if request.prompt.contains(pattern.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.default_response.clone())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_count.fetch_add(1, Ordering::SeqCst);
        Ok(pseudo_embedding(text))
    }

    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-generate"
    }

    fn embedding_model(&self) -> &str {
        "mock-embed"
    }
}

/// Hash token occurrences into a fixed-dimension vector and L2-normalize.
/// Similar texts share tokens and therefore direction; the result is stable
/// across runs.
pub fn pseudo_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let mut hash: u64 = 1469598103934665603;
        for byte in token.to_ascii_lowercase().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(1099511628211);
        }
        vector[(hash % MOCK_DIMENSIONS as u64) as usize] += 1.0;
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_routing() {
        let client = MockLlmClient::new()
            .with_default_response("default")
            .with_response_for("File: a.py", "page for a");

        let hit = client
            .generate(&GenerationRequest::new("... File: a.py ...", 0.0))
            .await
            .unwrap();
        assert_eq!(hit, "page for a");

        let miss = client
            .generate(&GenerationRequest::new("File: b.py", 0.0))
            .await
            .unwrap();
        assert_eq!(miss, "default");
    }

    #[tokio::test]
    async fn test_prompt_recording() {
        let client = MockLlmClient::new();
        client
            .generate(&GenerationRequest::new("first", 0.0))
            .await
            .unwrap();
        client
            .generate(&GenerationRequest::new("second", 0.0))
            .await
            .unwrap();
        assert_eq!(client.prompts(), vec!["first", "second"]);
    }

    #[test]
    fn test_pseudo_embedding_deterministic() {
        let a = pseudo_embedding("billing invoices payment");
        let b = pseudo_embedding("billing invoices payment");
        assert_eq!(a, b);
        assert_eq!(a.len(), MOCK_DIMENSIONS);
    }

    #[test]
    fn test_pseudo_embedding_similarity_ordering() {
        let base = pseudo_embedding("user authentication login session");
        let close = pseudo_embedding("authentication login flow");
        let far = pseudo_embedding("matrix eigenvalue decomposition");

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&base, &close) > dot(&base, &far));
    }
}
