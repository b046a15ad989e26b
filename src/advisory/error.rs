use crate::error::ErrorKind;
use crate::llm::BackendError;
use thiserror::Error;

/// Normalized advisory failures; provider-specific detail stays in the message
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdvisoryError {
    #[error("Advisory service unavailable: {0}")]
    Unavailable(String),

    #[error("Advisory service rate limited{}", .retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Cannot reach advisory service: {0}")]
    UpstreamConnectionError(String),

    #[error("Advisory service returned status {code}")]
    UpstreamStatusError { code: u16, message: String },

    #[error("Advisory request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Advisory request failed: {0}")]
    Unknown(String),
}

impl AdvisoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdvisoryError::Unavailable(_) => ErrorKind::AdvisoryUnavailable,
            AdvisoryError::RateLimited { .. } => ErrorKind::RateLimited,
            AdvisoryError::Timeout { .. } => ErrorKind::Timeout,
            AdvisoryError::UpstreamConnectionError(_)
            | AdvisoryError::UpstreamStatusError { .. }
            | AdvisoryError::Unknown(_) => ErrorKind::UpstreamError,
        }
    }

    /// Upstream body or transport detail
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            AdvisoryError::UpstreamStatusError { message, .. } if !message.is_empty() => {
                Some(message.clone())
            }
            AdvisoryError::UpstreamConnectionError(message) | AdvisoryError::Unknown(message) => {
                Some(message.clone())
            }
            _ => None,
        }
    }
}

impl From<BackendError> for AdvisoryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ConfigurationError { message } => AdvisoryError::Unavailable(message),
            BackendError::RateLimitError { retry_after } => AdvisoryError::RateLimited { retry_after },
            BackendError::ApiError {
                status_code: Some(429),
                ..
            } => AdvisoryError::RateLimited { retry_after: None },
            BackendError::ApiError {
                status_code: Some(code),
                message,
            } => AdvisoryError::UpstreamStatusError { code, message },
            BackendError::NetworkError { message } => AdvisoryError::UpstreamConnectionError(message),
            BackendError::TimeoutError { seconds } => AdvisoryError::Timeout { seconds },
            BackendError::InvalidResponse {
                message,
                raw_response,
            } => AdvisoryError::Unknown(match raw_response {
                Some(raw) => format!("{}: {}", message, raw),
                None => message,
            }),
            other @ (BackendError::ApiError {
                status_code: None, ..
            }
            | BackendError::Other { .. }) => AdvisoryError::Unknown(other.to_string()),
        }
    }
}
