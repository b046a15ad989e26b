//! Error taxonomy shared by every pipeline stage
//!
//! Every failure surfaced to a caller is a [`PipelineError`], and every
//! `PipelineError` maps onto one stable [`ErrorKind`] that client tooling can
//! branch on. Captured process output or upstream bodies travel with the error
//! and are exposed through [`PipelineError::diagnostics`].

use crate::advisory::AdvisoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Pipeline step an error or a process invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    DetectLanguage,
    Instrument,
    Containerize,
    Run,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::DetectLanguage => "detect_language",
            Stage::Instrument => "instrument",
            Stage::Containerize => "containerize",
            Stage::Run => "run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a remote source could not be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFailure {
    Auth,
    NotFound,
    Network,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Auth => write!(f, "auth"),
            SourceFailure::NotFound => write!(f, "notfound"),
            SourceFailure::Network => write!(f, "network"),
        }
    }
}

/// Stable, machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidState,
    NotFound,
    InvalidWorkspace,
    UnsupportedLanguage,
    SourceUnavailable,
    ProcessFailure,
    Timeout,
    AdvisoryUnavailable,
    RateLimited,
    UpstreamError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidWorkspace => "invalid_workspace",
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::SourceUnavailable => "source_unavailable",
            ErrorKind::ProcessFailure => "process_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::AdvisoryUnavailable => "advisory_unavailable",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }

    /// Process exit code used by the CLI for this kind
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidState => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::InvalidWorkspace => 4,
            ErrorKind::UnsupportedLanguage => 5,
            ErrorKind::SourceUnavailable => 6,
            ErrorKind::ProcessFailure => 7,
            ErrorKind::Timeout => 8,
            ErrorKind::AdvisoryUnavailable => 9,
            ErrorKind::RateLimited | ErrorKind::UpstreamError => 10,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

/// Errors produced by the pipeline and its collaborators
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{operation} is not allowed for application {id} in state {state}")]
    InvalidState {
        id: String,
        operation: &'static str,
        state: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid workspace {path}: {reason}")]
    InvalidWorkspace { path: PathBuf, reason: String },

    #[error("No supported language detected for application {id}")]
    UnsupportedLanguage { id: String },

    #[error("Source unavailable ({reason}): {message}")]
    SourceUnavailable {
        reason: SourceFailure,
        message: String,
    },

    #[error("{stage} failed with exit code {}", display_code(.exit_code))]
    ProcessFailure {
        stage: Stage,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout {
        stage: Stage,
        after: Duration,
        partial_output: String,
    },

    #[error(transparent)]
    Advisory(#[from] AdvisoryError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidState { .. } => ErrorKind::InvalidState,
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::InvalidWorkspace { .. } => ErrorKind::InvalidWorkspace,
            PipelineError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            PipelineError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            PipelineError::ProcessFailure { .. } => ErrorKind::ProcessFailure,
            PipelineError::Timeout { .. } => ErrorKind::Timeout,
            PipelineError::Advisory(err) => err.kind(),
        }
    }

    /// Captured output or upstream body worth showing to an operator
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            PipelineError::ProcessFailure { stdout, stderr, .. } => {
                if stdout.is_empty() && stderr.is_empty() {
                    None
                } else {
                    Some(format!("--- stdout ---\n{}\n--- stderr ---\n{}", stdout, stderr))
                }
            }
            PipelineError::Timeout { partial_output, .. } => {
                if partial_output.is_empty() {
                    None
                } else {
                    Some(partial_output.clone())
                }
            }
            PipelineError::SourceUnavailable { message, .. } => Some(message.clone()),
            PipelineError::Advisory(err) => err.diagnostics(),
            _ => None,
        }
    }

    pub(crate) fn workspace(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::InvalidWorkspace {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
