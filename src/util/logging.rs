//! Structured logging setup for tracepack
//!
//! Console output by default, JSON when `TRACEPACK_LOG_JSON=true`. Logs always
//! go to stderr so that `--format json` output on stdout stays machine-readable.
//! `RUST_LOG` overrides everything when set.
//!
//! ```no_run
//! use tracepack::util::logging;
//!
//! logging::init_logging(logging::config_from_env());
//! tracing::info!(app_id = "0b6c…", "Application ingested");
//! ```

use std::env;
use std::io;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise
const NOISY_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "genai"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level for tracepack's own targets
    pub level: Level,

    /// Emit one JSON object per event instead of human-readable lines
    pub use_json: bool,

    /// Include the module target (e.g., tracepack::pipeline) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Include thread ID and name in logs
    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// JSON output with full metadata, for running under a log collector
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }
}

/// Parses a log level, falling back to `INFO` for anything unrecognised
///
/// ```
/// use tracepack::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn directive(spec: String) -> Option<Directive> {
    spec.parse().ok()
}

/// Builds the filter used by [`init_logging`]
fn build_filter(level: Level, rust_log_set: bool) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    if let Some(own) = directive(format!("tracepack={}", level)) {
        filter = filter.add_directive(own);
    }

    if !rust_log_set {
        for krate in NOISY_CRATES {
            if let Some(quiet) = directive(format!("{}=warn", krate)) {
                filter = filter.add_directive(quiet);
            }
        }
    }

    filter
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level, env::var("RUST_LOG").is_ok());

        if config.use_json {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_thread_ids(config.include_thread_ids)
                        .with_thread_names(config.include_thread_ids),
                )
                .try_init();
        }
    });
}

/// Reads `TRACEPACK_LOG_LEVEL` and `TRACEPACK_LOG_JSON`
pub fn config_from_env() -> LoggingConfig {
    let level_str = env::var("TRACEPACK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let use_json = env::var("TRACEPACK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    let base = if use_json {
        LoggingConfig::production()
    } else {
        LoggingConfig::default()
    };
    LoggingConfig {
        level: parse_level(&level_str),
        ..base
    }
}
