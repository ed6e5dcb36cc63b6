//! User-facing error types.

use stenolens_client::{ApiError, ApiErrorKind};
use thiserror::Error;

use crate::host::UserAction;

/// Page where users manage keys and upgrade their plan.
pub const DASHBOARD_URL: &str = "https://stenography.dev/dashboard";

/// Errors surfaced to the user while providing annotations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LensError {
    /// Missing or rejected API key.
    #[error("Stenolens API key is missing or invalid: {0}")]
    Auth(String),

    /// Monthly invocation limit reached.
    #[error("Stenolens invocation quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The file's language is not supported by the service.
    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    /// Any other transport or decoding failure.
    #[error("Request failed: {0}")]
    Transport(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LensError {
    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Buttons offered alongside the error message.
    pub fn actions(&self) -> &'static [UserAction] {
        match self {
            Self::Auth(_) => &[UserAction::InputApiKey, UserAction::GetNewApiKey],
            Self::QuotaExceeded(_) => &[UserAction::Upgrade],
            _ => &[],
        }
    }
}

impl From<ApiError> for LensError {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Unauthorized => Self::Auth(err.message),
            ApiErrorKind::QuotaExceeded => Self::QuotaExceeded(err.message),
            ApiErrorKind::Unknown => Self::Transport(err.message),
        }
    }
}
