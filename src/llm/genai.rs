//! GenAI-based LLM client implementation
//!
//! Uses the `genai` crate to reach the hosted providers (Anthropic, Gemini,
//! Groq, xAI and friends) through one interface.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, error};

pub struct GenAIClient {
    client: Client,
    model: String,
    provider: AdapterKind,
    timeout: Duration,
}

impl GenAIClient {
    /// Creates a client for `provider`, optionally pinned to a custom endpoint
    pub async fn new(
        provider: AdapterKind,
        model: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = if let Some(endpoint_url) = base_url {
            debug!(
                "Using custom endpoint for {}: {}",
                provider.as_str(),
                endpoint_url
            );

            let model_clone = model.clone();
            let resolver = ServiceTargetResolver::from_resolver_fn(
                move |_service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error>
                {
                    let endpoint = Endpoint::from_owned(endpoint_url.clone());

                    let auth = match provider.default_key_env_name() {
                        Some(api_key_var) => AuthData::from_env(api_key_var),
                        None => AuthData::from_single(""),
                    };

                    Ok(ServiceTarget {
                        endpoint,
                        auth,
                        model: ModelIden::new(provider, &model_clone),
                    })
                },
            );

            Client::builder()
                .with_service_target_resolver(resolver)
                .build()
        } else {
            Client::default()
        };

        debug!(
            "Creating GenAI client: provider={}, model={}",
            provider.as_str(),
            model,
        );

        Ok(Self {
            client,
            model,
            provider,
            timeout,
        })
    }

    fn convert_message(msg: &ChatMessage) -> GenAIChatMessage {
        match msg.role {
            MessageRole::System => GenAIChatMessage::system(msg.content.as_str()),
            MessageRole::User => GenAIChatMessage::user(msg.content.as_str()),
        }
    }
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)status(?:\s*code)?\W{0,4}([1-5]\d\d)\b").expect("valid regex")
    })
}

fn credentials_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)api.?key|no auth").expect("valid regex"))
}

fn connect_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)error sending request|connection refused|dns error|failed to connect|tcp connect")
            .expect("valid regex")
    })
}

/// Recovers a transport error from genai's error text, which does not expose
/// the HTTP status as a typed field
pub(crate) fn classify_genai_error(provider: &str, message: &str) -> BackendError {
    if let Some(code) = status_regex()
        .captures(message)
        .and_then(|caps| caps[1].parse::<u16>().ok())
    {
        return if code == 429 {
            BackendError::RateLimitError { retry_after: None }
        } else {
            BackendError::ApiError {
                message: message.to_string(),
                status_code: Some(code),
            }
        };
    }

    if credentials_regex().is_match(message) {
        BackendError::ConfigurationError {
            message: format!("{} credentials unavailable: {}", provider, message),
        }
    } else if connect_regex().is_match(message) {
        BackendError::NetworkError {
            message: message.to_string(),
        }
    } else {
        BackendError::ApiError {
            message: format!("{} request failed: {}", provider, message),
            status_code: None,
        }
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let start = Instant::now();

        let messages: Vec<GenAIChatMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let genai_request = GenAIChatRequest::new(messages);

        let mut options = ChatOptions::default();
        if let Some(temp) = request.temperature {
            options = options.with_temperature(temp as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        let response = match tokio::time::timeout(
            self.timeout,
            self.client
                .exec_chat(&self.model, genai_request, Some(&options)),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!("{} API error: {}", self.provider.as_str(), e);
                return Err(classify_genai_error(self.provider.as_str(), &e.to_string()));
            }
            Err(_) => {
                error!(
                    "{} request timed out after {}s",
                    self.provider.as_str(),
                    self.timeout.as_secs()
                );
                return Err(BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let content = response.first_text().unwrap_or_default().to_string();
        let model = response.model_iden.model_name.to_string();

        Ok(LLMResponse::text(content, start.elapsed()).with_model(model))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_genai_client_creation() {
        let client = GenAIClient::new(
            AdapterKind::Anthropic,
            "claude-3-5-haiku-latest".to_string(),
            None,
            Duration::from_secs(30),
        )
        .await
        .unwrap();

        assert_eq!(client.name(), "Anthropic");
        assert_eq!(client.model_info(), Some("claude-3-5-haiku-latest".to_string()));
    }

    #[test]
    fn test_classify_status_codes() {
        let err = classify_genai_error(
            "Anthropic",
            "Web call failed for model 'x'. Cause: Request failed with status code '429 Too Many Requests'",
        );
        assert_eq!(err, BackendError::RateLimitError { retry_after: None });

        let err = classify_genai_error("Anthropic", "ResponseFailedStatus { status: 503, body: \"overloaded\" }");
        assert!(matches!(
            err,
            BackendError::ApiError {
                status_code: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_classify_missing_key_and_network() {
        let err = classify_genai_error("Gemini", "Resolver error: ApiKeyEnvNotFound { env_name: \"GEMINI_API_KEY\" }");
        assert!(matches!(err, BackendError::ConfigurationError { .. }));

        let err = classify_genai_error("Groq", "reqwest error: error sending request for url (https://api.groq.com)");
        assert!(matches!(err, BackendError::NetworkError { .. }));

        let err = classify_genai_error("Groq", "something else");
        assert!(matches!(err, BackendError::ApiError { status_code: None, .. }));
    }
}
