use crate::config::{AdvisoryProvider, TracepackConfig};
use crate::llm::{GenAIClient, LLMClient, OpenAICompatibleClient, OLLAMA_ENDPOINT, OPENAI_ENDPOINT};
use genai::adapter::AdapterKind;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SelectedClient {
    pub client: Arc<dyn LLMClient>,
    pub provider: AdvisoryProvider,
    pub description: String,
}

impl std::fmt::Debug for SelectedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedClient")
            .field("provider", &self.provider)
            .field("description", &self.description)
            .finish()
    }
}

/// Builds the completion client the configuration asks for. `None` means
/// advisory calls will report the service as unavailable.
pub async fn select_llm_client(config: &TracepackConfig) -> Option<SelectedClient> {
    let Some(kind) = config.provider.adapter_kind() else {
        info!("Advisory provider disabled");
        return None;
    };

    if config.api_base_url.is_none() && !provider_has_credentials(kind) {
        warn!(
            "Skipping {} - no credentials available ({})",
            config.provider,
            kind.default_key_env_name().unwrap_or("unknown")
        );
        return None;
    }

    if config.provider.is_openai_compatible() || config.api_base_url.is_some() {
        try_openai_compatible(config, kind)
    } else {
        try_genai(config, kind).await
    }
}

fn try_openai_compatible(config: &TracepackConfig, kind: AdapterKind) -> Option<SelectedClient> {
    let endpoint = config.api_base_url.clone().unwrap_or_else(|| {
        if config.provider == AdvisoryProvider::Ollama {
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| OLLAMA_ENDPOINT.to_string())
        } else {
            OPENAI_ENDPOINT.to_string()
        }
    });
    let api_key = kind
        .default_key_env_name()
        .and_then(|var| std::env::var(var).ok())
        .filter(|key| !key.trim().is_empty());

    match OpenAICompatibleClient::with_timeout(
        endpoint.clone(),
        config.model.clone(),
        api_key,
        config.request_timeout(),
    ) {
        Ok(client) => {
            info!("Using {} at {} ({})", config.provider, endpoint, config.model);
            Some(SelectedClient {
                client: Arc::new(client),
                provider: config.provider,
                description: format!("{} ({} @ {})", config.provider, config.model, endpoint),
            })
        }
        Err(e) => {
            warn!("Failed to initialize {}: {}", config.provider, e);
            None
        }
    }
}

async fn try_genai(config: &TracepackConfig, kind: AdapterKind) -> Option<SelectedClient> {
    match GenAIClient::new(kind, config.model.clone(), None, config.request_timeout()).await {
        Ok(client) => {
            info!("Using configured provider: {} ({})", config.provider, config.model);
            Some(SelectedClient {
                client: Arc::new(client),
                provider: config.provider,
                description: format!("{} ({})", config.provider, config.model),
            })
        }
        Err(e) => {
            warn!("Failed to initialize {}: {}", config.provider, e);
            None
        }
    }
}

/// Check if provider has available credentials
fn provider_has_credentials(provider: AdapterKind) -> bool {
    match provider.default_key_env_name() {
        None => true,
        Some(env_var) => {
            let present = std::env::var(env_var)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            debug!("Credential check for {}: {}", env_var, present);
            present
        }
    }
}
