//! HTTP client for an OpenAI-compatible provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::core::config::LlmConfig;
use crate::core::errors::{OyaError, Result};
use crate::llm::{GenerationRequest, LlmClient};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// LLM client speaking the OpenAI-compatible chat/embeddings protocol.
#[derive(Debug)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl HttpLlmClient {
    /// Build a client from configuration, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: LlmConfig, timeout_secs: u64) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| OyaError::LlmAuth {
            message: format!("environment variable {} not set", config.api_key_env),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn classify_status(status: StatusCode, body: String) -> OyaError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OyaError::LlmAuth {
                message: format!("{status}: {body}"),
            },
            StatusCode::TOO_MANY_REQUESTS => OyaError::LlmRateLimit {
                message: format!("{status}: {body}"),
            },
            s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => OyaError::LlmTransient {
                message: format!("{status}: {body}"),
            },
            _ => OyaError::malformed_output(format!("provider rejected request: {status}: {body}")),
        }
    }

    async fn post_json<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<R> {
        let url = format!("{}/{path}", self.config.api_endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| OyaError::malformed_output(format!("provider response: {e}")))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        let payload = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.temperature,
        };

        let response: ChatResponse = self.post_json("chat/completions", &payload).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OyaError::malformed_output("no choices in provider response"))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = EmbeddingRequest {
            model: self.config.embedding_model.clone(),
            input: text.to_string(),
        };

        let response: EmbeddingResponse = self.post_json("embeddings", &payload).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| OyaError::malformed_output("no embedding in provider response"))
    }

    fn provider(&self) -> &str {
        &self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn embedding_model(&self) -> &str {
        &self.config.embedding_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = HttpLlmClient::classify_status(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(err, OyaError::LlmAuth { .. }));

        let err = HttpLlmClient::classify_status(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(err, OyaError::LlmRateLimit { .. }));

        let err = HttpLlmClient::classify_status(StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(err, OyaError::LlmTransient { .. }));

        let err = HttpLlmClient::classify_status(StatusCode::BAD_REQUEST, String::new());
        assert!(matches!(err, OyaError::MalformedOutput { .. }));
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let mut config = LlmConfig::default();
        config.api_key_env = "OYA_TEST_KEY_THAT_DOES_NOT_EXIST".to_string();
        let err = HttpLlmClient::from_config(config, 5).unwrap_err();
        assert!(matches!(err, OyaError::LlmAuth { .. }));
    }
}
