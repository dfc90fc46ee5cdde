//! Retry policy for LLM calls.
//!
//! Rate-limited and transient failures are retried with exponential backoff;
//! auth failures, malformed output, and cancellation propagate immediately.
//! The cancellation token is observed both around the call and while
//! sleeping between attempts.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::errors::{OyaError, Result};
use crate::llm::{GenerationRequest, LlmClient};

/// Base delay doubled on every retry.
const BACKOFF_BASE_MS: u64 = 500;

/// Run `generate` with the retry policy applied.
pub async fn generate_with_retry(
    client: &dyn LlmClient,
    request: &GenerationRequest,
    max_retries: u32,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(OyaError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(OyaError::Cancelled),
            result = client.generate(request) => result,
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retriable() && attempt < max_retries => {
                attempt += 1;
                let delay = Duration::from_millis(BACKOFF_BASE_MS * (1u64 << attempt.min(6)));
                warn!(attempt, ?delay, error = %err, "LLM call failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(OyaError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run `embed` with the same retry policy.
pub async fn embed_with_retry(
    client: &dyn LlmClient,
    text: &str,
    max_retries: u32,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(OyaError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(OyaError::Cancelled),
            result = client.embed(text) => result,
        };

        match outcome {
            Ok(vector) => return Ok(vector),
            Err(err) if err.is_retriable() && attempt < max_retries => {
                attempt += 1;
                let delay = Duration::from_millis(BACKOFF_BASE_MS * (1u64 << attempt.min(6)));
                warn!(attempt, ?delay, error = %err, "embedding call failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(OyaError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_success_passes_through() {
        let client = MockLlmClient::new().with_default_response("hello");
        let request = GenerationRequest::new("hi", 0.2);
        let cancel = CancellationToken::new();
        let text = generate_with_retry(&client, &request, 3, &cancel)
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(client.generate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retried() {
        let client = MockLlmClient::new()
            .with_default_response("recovered")
            .failing_first(2, || OyaError::LlmTransient {
                message: "503".into(),
            });
        let request = GenerationRequest::new("hi", 0.2);
        let cancel = CancellationToken::new();
        let text = generate_with_retry(&client, &request, 3, &cancel)
            .await
            .unwrap();
        assert_eq!(text, "recovered");
        assert_eq!(client.generate_calls(), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let client = MockLlmClient::new().failing_first(5, || OyaError::LlmAuth {
            message: "401".into(),
        });
        let request = GenerationRequest::new("hi", 0.2);
        let cancel = CancellationToken::new();
        let err = generate_with_retry(&client, &request, 3, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OyaError::LlmAuth { .. }));
        assert_eq!(client.generate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let client = MockLlmClient::new().failing_first(10, || OyaError::LlmRateLimit {
            message: "429".into(),
        });
        let request = GenerationRequest::new("hi", 0.2);
        let cancel = CancellationToken::new();
        let err = generate_with_retry(&client, &request, 2, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OyaError::LlmRateLimit { .. }));
        assert_eq!(client.generate_calls(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let client = MockLlmClient::new().with_default_response("unused");
        let request = GenerationRequest::new("hi", 0.2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generate_with_retry(&client, &request, 3, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, OyaError::Cancelled));
        assert_eq!(client.generate_calls(), 0);
    }
}
