use super::error::AdvisoryError;
use super::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::config::TracepackConfig;
use crate::context::ContextDigest;
use crate::detection::Language;
use crate::llm::{ChatMessage, LLMClient, LLMRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorySettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl AdvisorySettings {
    pub fn from_config(config: &TracepackConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.advisory_max_tokens,
            temperature: config.advisory_temperature,
            timeout: config.request_timeout(),
        }
    }
}

/// Suggestions returned for one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub text: String,
    /// Model that produced the text
    pub model: String,
    pub language: Language,
    pub digest_chars: usize,
    pub files_read: usize,
}

/// Submits digests to the completion service. Holds no client when none is
/// configured, in which case every call reports `Unavailable`.
pub struct AdvisoryClient {
    client: Option<Arc<dyn LLMClient>>,
    settings: AdvisorySettings,
}

impl AdvisoryClient {
    pub fn new(client: Option<Arc<dyn LLMClient>>, settings: AdvisorySettings) -> Self {
        Self { client, settings }
    }

    pub fn request_for(&self, digest: &ContextDigest, language: Language) -> LLMRequest {
        LLMRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(digest, language)),
        ])
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens)
    }

    /// One completion call, bounded by the configured timeout. Never retried.
    pub async fn advise(
        &self,
        digest: &ContextDigest,
        language: Language,
    ) -> Result<Advice, AdvisoryError> {
        let client = self.client.as_ref().ok_or_else(|| {
            AdvisoryError::Unavailable("no completion service is configured".to_string())
        })?;

        let request = self.request_for(digest, language);
        info!(
            client = client.name(),
            model = %self.settings.model,
            digest_chars = digest.chars_used,
            files = digest.files_read,
            "Requesting advisory suggestions"
        );

        let response = match tokio::time::timeout(self.settings.timeout, client.chat(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(client = client.name(), error = %e, "Advisory request failed");
                return Err(e.into());
            }
            Err(_) => {
                warn!(
                    client = client.name(),
                    seconds = self.settings.timeout.as_secs(),
                    "Advisory request timed out"
                );
                return Err(AdvisoryError::Timeout {
                    seconds: self.settings.timeout.as_secs(),
                });
            }
        };

        Ok(Advice {
            text: response.content,
            model: response.model.unwrap_or_else(|| self.settings.model.clone()),
            language,
            digest_chars: digest.chars_used,
            files_read: digest.files_read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, LLMResponse, MessageRole, MockLLMClient, MockResponse};
    use async_trait::async_trait;

    fn settings() -> AdvisorySettings {
        AdvisorySettings {
            model: "gpt-4".to_string(),
            max_tokens: 512,
            temperature: 0.2,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_advise_uses_fixed_prompt_and_sampling() {
        let mock = Arc::new(MockLLMClient::new());
        mock.add_response(MockResponse::from_model("Add spans around DB calls", "gpt-4-0613"));
        let client = AdvisoryClient::new(Some(mock.clone()), settings());

        let advice = client
            .advise(&ContextDigest::no_content(), Language::Python)
            .await
            .unwrap();

        assert_eq!(advice.text, "Add spans around DB calls");
        assert_eq!(advice.model, "gpt-4-0613");
        assert_eq!(advice.language, Language::Python);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].first(MessageRole::System), Some(SYSTEM_PROMPT));
        assert_eq!(requests[0].temperature, Some(0.2));
        assert_eq!(requests[0].max_tokens, Some(512));
    }

    #[tokio::test]
    async fn test_model_falls_back_to_configured() {
        let mock = Arc::new(MockLLMClient::new());
        mock.add_response(MockResponse::text("ok"));
        let client = AdvisoryClient::new(Some(mock), settings());

        let advice = client
            .advise(&ContextDigest::no_content(), Language::Java)
            .await
            .unwrap();
        assert_eq!(advice.model, "gpt-4");
    }

    #[tokio::test]
    async fn test_no_client_is_unavailable() {
        let client = AdvisoryClient::new(None, settings());

        let err = client
            .advise(&ContextDigest::no_content(), Language::Node)
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisoryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_upstream_errors_are_normalized_and_not_retried() {
        let mock = Arc::new(MockLLMClient::new());
        mock.add_responses(vec![
            MockResponse::error(BackendError::RateLimitError { retry_after: Some(7) }),
            MockResponse::text("should not be consumed"),
        ]);
        let client = AdvisoryClient::new(Some(mock.clone()), settings());

        let err = client
            .advise(&ContextDigest::no_content(), Language::Python)
            .await
            .unwrap_err();
        assert_eq!(err, AdvisoryError::RateLimited { retry_after: Some(7) });
        assert_eq!(mock.remaining_responses(), 1);
    }

    struct Stalled;

    #[async_trait]
    impl LLMClient for Stalled {
        async fn chat(&self, _request: LLMRequest) -> Result<LLMResponse, BackendError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(LLMResponse::text("late", Duration::from_secs(60)))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let mut settings = settings();
        settings.timeout = Duration::from_millis(50);
        let client = AdvisoryClient::new(Some(Arc::new(Stalled)), settings);

        let err = client
            .advise(&ContextDigest::no_content(), Language::Python)
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisoryError::Timeout { .. }));
    }
}
