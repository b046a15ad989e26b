//! Configuration management for tracepack
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! ## Pipeline
//! - `TRACEPACK_BASE_DIR`: workspace root - default: "user-apps"
//! - `TRACEPACK_INSTRUMENTATION_DIR`: per-language `setup.sh` scripts - default: "instrumentation"
//! - `TRACEPACK_SCRIPT_INTERPRETER`: interpreter for the scripts - default: "bash"
//! - `TRACEPACK_CONTAINER_CLI`: container tool - default: "docker"
//! - `TRACEPACK_COMPOSE_BIN`: standalone compose binary (profile v1) - default: "docker-compose"
//! - `TRACEPACK_STAGE_PROFILE`: v1|v2 - default: "v2"
//! - `TRACEPACK_GIT_BIN`: default: "git"
//! - `TRACEPACK_CLONE_TIMEOUT`, `TRACEPACK_INSTRUMENT_TIMEOUT`, `TRACEPACK_BUILD_TIMEOUT`,
//!   `TRACEPACK_RUN_TIMEOUT`: stage timeouts in seconds - default: 120, 300, 600, 180
//! - `TRACEPACK_TELEMETRY_NETWORK`: external compose network - default: "telemetry_default"
//! - `TRACEPACK_OTLP_ENDPOINT`: collector endpoint - default: "http://otel-collector:4317"
//!
//! ## Advisory
//! - `TRACEPACK_PROVIDER`: openai|ollama|anthropic|gemini|groq|xai|none - default: "openai"
//! - `TRACEPACK_MODEL`: default: "gpt-4"
//! - `TRACEPACK_API_BASE_URL`: OpenAI-compatible endpoint override
//! - `TRACEPACK_REQUEST_TIMEOUT`: seconds - default: "60"
//! - `TRACEPACK_ADVISORY_MAX_TOKENS` / `TRACEPACK_ADVISORY_TEMPERATURE`: default: 1024 / 0.2
//!
//! Credentials are read from the provider's usual variable (`OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, ...).
//!
//! ## Context digest
//! - `TRACEPACK_CONTEXT_MAX_FILES`, `TRACEPACK_CONTEXT_MAX_FILE_BYTES`, `TRACEPACK_CONTEXT_MAX_CHARS`
//! - `TRACEPACK_CONTEXT_MAX_DEPTH`, `TRACEPACK_CONTEXT_MAX_TREE_LINES`, `TRACEPACK_CONTEXT_MAX_DIR_ENTRIES`
//!
//! ## Logging
//! - `TRACEPACK_LOG_LEVEL`: default: "info"
//! - `TRACEPACK_LOG_JSON`: default: "false"

use crate::context::budget::MIN_MAX_CHARS;
use crate::context::ContextBudget;
use crate::executor::StageProfile;
use genai::adapter::AdapterKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_DIR: &str = "user-apps";
const DEFAULT_INSTRUMENTATION_DIR: &str = "instrumentation";
const DEFAULT_SCRIPT_INTERPRETER: &str = "bash";
const DEFAULT_CONTAINER_CLI: &str = "docker";
const DEFAULT_COMPOSE_BIN: &str = "docker-compose";
const DEFAULT_GIT_BIN: &str = "git";
const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_INSTRUMENT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 180;
const DEFAULT_TELEMETRY_NETWORK: &str = "telemetry_default";
const DEFAULT_OTLP_ENDPOINT: &str = "http://otel-collector:4317";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ADVISORY_MAX_TOKENS: u32 = 1024;
const DEFAULT_ADVISORY_TEMPERATURE: f32 = 0.2;
const DEFAULT_LOG_LEVEL: &str = "info";

const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_CONTEXT_CHARS: usize = 10_485_760;

/// Directory under the base path holding persisted application records
pub const STATE_DIR_NAME: &str = ".tracepack";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: openai, ollama, anthropic, gemini, groq, xai, none")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Completion service backing the advisory path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryProvider {
    OpenAI,
    Ollama,
    Anthropic,
    Gemini,
    Groq,
    Xai,
    /// Advisory calls fail with `advisory_unavailable`
    None,
}

impl AdvisoryProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisoryProvider::OpenAI => "openai",
            AdvisoryProvider::Ollama => "ollama",
            AdvisoryProvider::Anthropic => "anthropic",
            AdvisoryProvider::Gemini => "gemini",
            AdvisoryProvider::Groq => "groq",
            AdvisoryProvider::Xai => "xai",
            AdvisoryProvider::None => "none",
        }
    }

    pub fn adapter_kind(&self) -> Option<AdapterKind> {
        match self {
            AdvisoryProvider::OpenAI => Some(AdapterKind::OpenAI),
            AdvisoryProvider::Ollama => Some(AdapterKind::Ollama),
            AdvisoryProvider::Anthropic => Some(AdapterKind::Anthropic),
            AdvisoryProvider::Gemini => Some(AdapterKind::Gemini),
            AdvisoryProvider::Groq => Some(AdapterKind::Groq),
            AdvisoryProvider::Xai => Some(AdapterKind::Xai),
            AdvisoryProvider::None => None,
        }
    }

    /// Speaks the OpenAI chat-completions wire format natively
    pub fn is_openai_compatible(&self) -> bool {
        matches!(self, AdvisoryProvider::OpenAI | AdvisoryProvider::Ollama)
    }
}

impl fmt::Display for AdvisoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdvisoryProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(AdvisoryProvider::OpenAI),
            "ollama" => Ok(AdvisoryProvider::Ollama),
            "anthropic" | "claude" => Ok(AdvisoryProvider::Anthropic),
            "gemini" => Ok(AdvisoryProvider::Gemini),
            "groq" => Ok(AdvisoryProvider::Groq),
            "xai" | "grok" => Ok(AdvisoryProvider::Xai),
            "none" | "off" | "disabled" => Ok(AdvisoryProvider::None),
            other => Err(ConfigError::InvalidProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracepackConfig {
    pub base_dir: PathBuf,
    pub instrumentation_dir: PathBuf,
    pub script_interpreter: String,
    pub container_cli: String,
    pub compose_bin: String,
    pub stage_profile: StageProfile,
    pub git_bin: String,

    pub clone_timeout_secs: u64,
    pub instrument_timeout_secs: u64,
    pub build_timeout_secs: u64,
    pub run_timeout_secs: u64,

    pub telemetry_network: String,
    pub otlp_endpoint: String,

    pub provider: AdvisoryProvider,
    pub model: String,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub advisory_max_tokens: u32,
    pub advisory_temperature: f32,

    pub context: ContextBudget,

    pub log_level: String,
    pub log_json: bool,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for TracepackConfig {
    /// Loads from `TRACEPACK_*` variables; unparsable values fall back to
    /// their defaults
    fn default() -> Self {
        let defaults = ContextBudget::default();
        let context = ContextBudget {
            max_files: env_parse("TRACEPACK_CONTEXT_MAX_FILES", defaults.max_files),
            max_file_bytes: env_parse("TRACEPACK_CONTEXT_MAX_FILE_BYTES", defaults.max_file_bytes),
            max_chars: env_parse("TRACEPACK_CONTEXT_MAX_CHARS", defaults.max_chars),
            max_depth: env_parse("TRACEPACK_CONTEXT_MAX_DEPTH", defaults.max_depth),
            max_tree_lines: env_parse("TRACEPACK_CONTEXT_MAX_TREE_LINES", defaults.max_tree_lines),
            max_dir_entries: env_parse("TRACEPACK_CONTEXT_MAX_DIR_ENTRIES", defaults.max_dir_entries),
        };

        Self {
            base_dir: PathBuf::from(env_string("TRACEPACK_BASE_DIR", DEFAULT_BASE_DIR)),
            instrumentation_dir: PathBuf::from(env_string(
                "TRACEPACK_INSTRUMENTATION_DIR",
                DEFAULT_INSTRUMENTATION_DIR,
            )),
            script_interpreter: env_string("TRACEPACK_SCRIPT_INTERPRETER", DEFAULT_SCRIPT_INTERPRETER),
            container_cli: env_string("TRACEPACK_CONTAINER_CLI", DEFAULT_CONTAINER_CLI),
            compose_bin: env_string("TRACEPACK_COMPOSE_BIN", DEFAULT_COMPOSE_BIN),
            stage_profile: env_parse("TRACEPACK_STAGE_PROFILE", StageProfile::default()),
            git_bin: env_string("TRACEPACK_GIT_BIN", DEFAULT_GIT_BIN),

            clone_timeout_secs: env_parse("TRACEPACK_CLONE_TIMEOUT", DEFAULT_CLONE_TIMEOUT_SECS),
            instrument_timeout_secs: env_parse(
                "TRACEPACK_INSTRUMENT_TIMEOUT",
                DEFAULT_INSTRUMENT_TIMEOUT_SECS,
            ),
            build_timeout_secs: env_parse("TRACEPACK_BUILD_TIMEOUT", DEFAULT_BUILD_TIMEOUT_SECS),
            run_timeout_secs: env_parse("TRACEPACK_RUN_TIMEOUT", DEFAULT_RUN_TIMEOUT_SECS),

            telemetry_network: env_string("TRACEPACK_TELEMETRY_NETWORK", DEFAULT_TELEMETRY_NETWORK),
            otlp_endpoint: env_string("TRACEPACK_OTLP_ENDPOINT", DEFAULT_OTLP_ENDPOINT),

            provider: env_parse("TRACEPACK_PROVIDER", AdvisoryProvider::OpenAI),
            model: env_string("TRACEPACK_MODEL", DEFAULT_MODEL),
            api_base_url: env::var("TRACEPACK_API_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            request_timeout_secs: env_parse("TRACEPACK_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS),
            advisory_max_tokens: env_parse(
                "TRACEPACK_ADVISORY_MAX_TOKENS",
                DEFAULT_ADVISORY_MAX_TOKENS,
            ),
            advisory_temperature: env_parse(
                "TRACEPACK_ADVISORY_TEMPERATURE",
                DEFAULT_ADVISORY_TEMPERATURE,
            ),

            context,

            log_level: env_string("TRACEPACK_LOG_LEVEL", DEFAULT_LOG_LEVEL).to_lowercase(),
            log_json: env_parse("TRACEPACK_LOG_JSON", false),
        }
    }
}

impl TracepackConfig {
    /// Loads from the environment like [`Default`], but reports an
    /// unrecognised provider instead of silently using the default one
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(raw) = env::var("TRACEPACK_PROVIDER") {
            if !raw.trim().is_empty() {
                config.provider = raw.parse()?;
            }
        }
        if let Ok(raw) = env::var("TRACEPACK_STAGE_PROFILE") {
            if !raw.trim().is_empty() {
                config.stage_profile = raw.parse().map_err(|error| ConfigError::ParseError {
                    field: "TRACEPACK_STAGE_PROFILE".to_string(),
                    error,
                })?;
            }
        }
        Ok(config)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn instrument_timeout(&self) -> Duration {
        Duration::from_secs(self.instrument_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks numeric ranges and the log level
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("Clone timeout", self.clone_timeout_secs),
            ("Instrument timeout", self.instrument_timeout_secs),
            ("Build timeout", self.build_timeout_secs),
            ("Run timeout", self.run_timeout_secs),
            ("Request timeout", self.request_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be at least 1 second",
                    name
                )));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} cannot exceed 1 hour",
                    name
                )));
            }
        }

        if self.context.max_chars < MIN_MAX_CHARS {
            return Err(ConfigError::ValidationFailed(format!(
                "Context character budget must be at least {}",
                MIN_MAX_CHARS
            )));
        }
        if self.context.max_chars > MAX_CONTEXT_CHARS {
            return Err(ConfigError::ValidationFailed(
                "Context character budget cannot exceed 10MB".to_string(),
            ));
        }
        if self.context.max_files == 0 || self.context.max_file_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "Context file budgets must be greater than zero".to_string(),
            ));
        }

        if self.advisory_max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "Advisory max tokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.advisory_temperature) {
            return Err(ConfigError::ValidationFailed(format!(
                "Advisory temperature {} is outside 0.0..=2.0",
                self.advisory_temperature
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert("base_dir".to_string(), self.base_dir.display().to_string());
        map.insert(
            "instrumentation_dir".to_string(),
            self.instrumentation_dir.display().to_string(),
        );
        map.insert("script_interpreter".to_string(), self.script_interpreter.clone());
        map.insert("container_cli".to_string(), self.container_cli.clone());
        map.insert("compose_bin".to_string(), self.compose_bin.clone());
        map.insert("stage_profile".to_string(), self.stage_profile.to_string());
        map.insert("git_bin".to_string(), self.git_bin.clone());
        map.insert("clone_timeout_secs".to_string(), self.clone_timeout_secs.to_string());
        map.insert(
            "instrument_timeout_secs".to_string(),
            self.instrument_timeout_secs.to_string(),
        );
        map.insert("build_timeout_secs".to_string(), self.build_timeout_secs.to_string());
        map.insert("run_timeout_secs".to_string(), self.run_timeout_secs.to_string());
        map.insert("telemetry_network".to_string(), self.telemetry_network.clone());
        map.insert("otlp_endpoint".to_string(), self.otlp_endpoint.clone());
        map.insert("provider".to_string(), self.provider.to_string());
        map.insert("model".to_string(), self.model.clone());
        if let Some(ref url) = self.api_base_url {
            map.insert("api_base_url".to_string(), url.clone());
        }
        map.insert(
            "request_timeout_secs".to_string(),
            self.request_timeout_secs.to_string(),
        );
        map.insert(
            "advisory_max_tokens".to_string(),
            self.advisory_max_tokens.to_string(),
        );
        map.insert(
            "advisory_temperature".to_string(),
            self.advisory_temperature.to_string(),
        );
        map.insert("context_max_files".to_string(), self.context.max_files.to_string());
        map.insert(
            "context_max_file_bytes".to_string(),
            self.context.max_file_bytes.to_string(),
        );
        map.insert("context_max_chars".to_string(), self.context.max_chars.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert("log_json".to_string(), self.log_json.to_string());

        map
    }
}

impl fmt::Display for TracepackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tracepack Configuration:")?;
        writeln!(f, "  Base Dir: {}", self.base_dir.display())?;
        writeln!(f, "  Instrumentation Dir: {}", self.instrumentation_dir.display())?;
        writeln!(f, "  Stage Profile: {}", self.stage_profile)?;
        writeln!(
            f,
            "  Timeouts: clone {}s, instrument {}s, build {}s, run {}s",
            self.clone_timeout_secs,
            self.instrument_timeout_secs,
            self.build_timeout_secs,
            self.run_timeout_secs
        )?;
        writeln!(
            f,
            "  Telemetry: network {}, endpoint {}",
            self.telemetry_network, self.otlp_endpoint
        )?;
        writeln!(f, "  Provider: {}", self.provider)?;
        writeln!(f, "  Model: {}", self.model)?;
        if let Some(ref url) = self.api_base_url {
            writeln!(f, "  API Base URL: {}", url)?;
        }
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(
            f,
            "  Context Budget: {} files, {} bytes/file, {} chars",
            self.context.max_files, self.context.max_file_bytes, self.context.max_chars
        )?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = vec![
            EnvGuard::unset("TRACEPACK_BASE_DIR"),
            EnvGuard::unset("TRACEPACK_PROVIDER"),
            EnvGuard::unset("TRACEPACK_MODEL"),
            EnvGuard::unset("TRACEPACK_STAGE_PROFILE"),
            EnvGuard::unset("TRACEPACK_CONTEXT_MAX_CHARS"),
            EnvGuard::unset("TRACEPACK_RUN_TIMEOUT"),
            EnvGuard::set("TRACEPACK_LOG_LEVEL", DEFAULT_LOG_LEVEL),
        ];

        let config = TracepackConfig::default();

        assert_eq!(config.base_dir, PathBuf::from(DEFAULT_BASE_DIR));
        assert_eq!(config.provider, AdvisoryProvider::OpenAI);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.stage_profile, StageProfile::V2);
        assert_eq!(config.context, ContextBudget::default());
        assert_eq!(config.run_timeout(), Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("TRACEPACK_BASE_DIR", "/srv/apps"),
            EnvGuard::set("TRACEPACK_PROVIDER", "claude"),
            EnvGuard::set("TRACEPACK_MODEL", "claude-3-5-haiku-latest"),
            EnvGuard::set("TRACEPACK_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("TRACEPACK_STAGE_PROFILE", "v1"),
            EnvGuard::set("TRACEPACK_RUN_TIMEOUT", "45"),
            EnvGuard::set("TRACEPACK_CONTEXT_MAX_CHARS", "4096"),
            EnvGuard::set("TRACEPACK_API_BASE_URL", "http://gateway:8080/v1"),
        ];

        let config = TracepackConfig::default();

        assert_eq!(config.base_dir, PathBuf::from("/srv/apps"));
        assert_eq!(config.provider, AdvisoryProvider::Anthropic);
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.stage_profile, StageProfile::V1);
        assert_eq!(config.run_timeout_secs, 45);
        assert_eq!(config.context.max_chars, 4096);
        assert_eq!(config.api_base_url.as_deref(), Some("http://gateway:8080/v1"));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_provider() {
        let _guard = EnvGuard::set("TRACEPACK_PROVIDER", "watson");

        assert_eq!(TracepackConfig::default().provider, AdvisoryProvider::OpenAI);
        assert!(matches!(
            TracepackConfig::from_env(),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<AdvisoryProvider>().unwrap(), AdvisoryProvider::OpenAI);
        assert_eq!("grok".parse::<AdvisoryProvider>().unwrap(), AdvisoryProvider::Xai);
        assert_eq!("off".parse::<AdvisoryProvider>().unwrap(), AdvisoryProvider::None);
        assert!(AdvisoryProvider::None.adapter_kind().is_none());
        assert!(AdvisoryProvider::Ollama.is_openai_compatible());
        assert!(!AdvisoryProvider::Gemini.is_openai_compatible());
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid_timeout() {
        let mut config = TracepackConfig::default();
        config.build_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = TracepackConfig::default();
        config.clone_timeout_secs = MAX_TIMEOUT_SECS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid_budget() {
        let mut config = TracepackConfig::default();
        config.context.max_chars = MIN_MAX_CHARS - 1;
        assert!(config.validate().is_err());

        let mut config = TracepackConfig::default();
        config.context.max_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_configuration_validation_invalid_log_level() {
        let mut config = TracepackConfig::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let config = TracepackConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Tracepack Configuration:"));
        assert!(display.contains("Provider:"));

        let map = config.to_display_map();
        assert_eq!(map.get("model"), Some(&config.model));
        assert!(map.contains_key("stage_profile"));
    }
}
