//! OpenAI-compatible HTTP client
//!
//! Talks to any endpoint that speaks the `/v1/chat/completions` format:
//! OpenAI itself, Ollama, LM Studio, vLLM and similar gateways.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com";
pub const OLLAMA_ENDPOINT: &str = "http://localhost:11434";

/// Longest slice of an error body kept in messages
const MAX_ERROR_BODY: usize = 2048;

pub struct OpenAICompatibleClient {
    /// Base URL without the `/v1` suffix
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http_client: Client,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            endpoint: normalize_endpoint(&endpoint.into()),
            model: model.into(),
            api_key,
            http_client,
            timeout,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }

    fn map_send_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            error!("Service request timed out after {:?}", self.timeout);
            BackendError::TimeoutError {
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            error!("Cannot connect to service at {}", self.endpoint);
            BackendError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else {
            error!("Service request error: {}", e);
            BackendError::NetworkError {
                message: format!("Request failed: {}", e),
            }
        }
    }
}

/// Accepts both `https://host` and `https://host/v1`
fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_string()
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Maps a non-success HTTP status onto a transport error
pub(crate) fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> BackendError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BackendError::RateLimitError { retry_after };
    }
    BackendError::ApiError {
        message: format!("HTTP {}: {}", status, truncate_body(body)),
        status_code: Some(status.as_u16()),
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let body = OpenAIRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Message {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: Some(false),
        };

        debug!(
            "Sending request to {}: messages={}, model={}",
            self.endpoint,
            body.messages.len(),
            self.model
        );

        let start = Instant::now();

        let mut builder = self.http_client.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();

            error!("Service API returned error status {}: {}", status, text);
            return Err(status_error(status, retry_after, &text));
        }

        let api_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!("Failed to parse service response: {}", e);
            if e.is_timeout() {
                BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                BackendError::InvalidResponse {
                    message: format!("JSON parse error: {}", e),
                    raw_response: None,
                }
            }
        })?;

        let elapsed = start.elapsed();
        info!(
            "Service generation completed in {:.2}s",
            elapsed.as_secs_f64()
        );

        if let Some(usage) = &api_response.usage {
            debug!(
                "Service stats: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = api_response
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .map(|message| message.content.clone())
            .ok_or_else(|| BackendError::InvalidResponse {
                message: "No content in service response".to_string(),
                raw_response: None,
            })?;

        let reply = LLMResponse::text(content, elapsed);
        Ok(match api_response.model {
            Some(model) => reply.with_model(model),
            None => reply,
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{} @ {}", self.model, self.endpoint))
    }
}

impl fmt::Debug for OpenAICompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAICompatibleClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIResponse {
    id: Option<String>,
    object: Option<String>,
    created: Option<i64>,
    /// Model that actually served the request
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    index: Option<u32>,
    finish_reason: Option<String>,
    message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAICompatibleClient {
        OpenAICompatibleClient::with_timeout(
            "http://localhost:11434/v1/",
            "qwen2.5-coder:7b",
            None,
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_normalization() {
        assert_eq!(normalize_endpoint("https://api.openai.com"), "https://api.openai.com");
        assert_eq!(normalize_endpoint("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_endpoint("http://localhost:11434/v1/"), "http://localhost:11434");
        assert_eq!(
            client().completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = OpenAIRequest {
            model: "gpt-4".to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You are an observability expert.".to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: "Hello".to_string(),
                },
            ],
            temperature: Some(0.25),
            max_tokens: Some(1024),
            stream: Some(false),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"temperature\":0.25"));
        assert!(json.contains("\"max_tokens\":1024"));
    }

    #[test]
    fn test_response_parsing() {
        let response_json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1234567890,
            "model": "gpt-4-0613",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": "Add the OpenTelemetry SDK"
                }
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15
            }
        }"#;

        let response: OpenAIResponse = serde_json::from_str(response_json).unwrap();
        assert_eq!(response.model.as_deref(), Some("gpt-4-0613"));
        assert_eq!(
            response.choices[0].message.as_ref().unwrap().content,
            "Add the OpenTelemetry SDK"
        );
        assert_eq!(response.usage.unwrap().prompt_tokens, 10);
    }

    #[test]
    fn test_status_error_mapping() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(12), "slow down"),
            BackendError::RateLimitError {
                retry_after: Some(12)
            }
        );

        let err = status_error(StatusCode::UNAUTHORIZED, None, "{\"error\":\"bad key\"}");
        assert!(matches!(
            err,
            BackendError::ApiError {
                status_code: Some(401),
                ..
            }
        ));
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY * 2);
        match status_error(StatusCode::BAD_GATEWAY, None, &body) {
            BackendError::ApiError { message, .. } => {
                assert!(message.len() < MAX_ERROR_BODY + 64);
                assert!(message.ends_with("..."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client = OpenAICompatibleClient::with_timeout(
            "http://127.0.0.1:9",
            "gpt-4",
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.chat(LLMRequest::new(vec![])).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::NetworkError { .. } | BackendError::TimeoutError { .. }
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = OpenAICompatibleClient::with_timeout(
            OPENAI_ENDPOINT,
            "gpt-4",
            Some("sk-secret".to_string()),
            Duration::from_secs(60),
        )
        .unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("OpenAICompatibleClient"));
        assert!(!debug_str.contains("sk-secret"));
        assert_eq!(client.name(), "openai-compatible");
    }
}
