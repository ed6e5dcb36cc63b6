//! Error types for explanation service calls.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Transport-level failure while talking to the service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network request failed.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// HTTP error status with a body that is not a service response.
    #[error("HTTP error {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    /// Response body could not be decoded as a service response.
    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),

    /// Failed to build HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuildError(String),
}

/// Classification of a failed service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Missing or rejected API key.
    Unauthorized,
    /// Monthly invocation limit reached.
    QuotaExceeded,
    /// Any other transport or parse failure.
    Unknown,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::QuotaExceeded => "quota exceeded",
            ApiErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A typed service failure. Every call on the client resolves to either a
/// value or one of these; transport errors never escape as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Builds an error from a service message, classifying it by content and
    /// by the HTTP status it arrived with.
    pub fn from_service(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify(status, &message);
        Self { kind, message }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.kind == ApiErrorKind::QuotaExceeded
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::HttpError { status, body } => Self::from_service(Some(*status), body),
            ClientError::UnexpectedBody(body) => Self::from_service(None, body),
            ClientError::NetworkError(inner) => match inner.status() {
                Some(status) => Self::from_service(Some(status), err.to_string()),
                None => Self::new(ApiErrorKind::Unknown, err.to_string()),
            },
            ClientError::ClientBuildError(_) => Self::new(ApiErrorKind::Unknown, err.to_string()),
        }
    }
}

/// Maps a status and message onto an [`ApiErrorKind`].
///
/// The service reports a bad key as `Unauthorized POST ...` and the monthly
/// cap with a message mentioning the limit.
pub fn classify(status: Option<StatusCode>, message: &str) -> ApiErrorKind {
    if matches!(
        status,
        Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::FORBIDDEN)
    ) || message.contains("Unauthorized")
    {
        return ApiErrorKind::Unauthorized;
    }

    if matches!(
        status,
        Some(StatusCode::TOO_MANY_REQUESTS) | Some(StatusCode::PAYMENT_REQUIRED)
    ) || is_quota_message(message)
    {
        return ApiErrorKind::QuotaExceeded;
    }

    ApiErrorKind::Unknown
}

/// Account-level cap wording only; request-size limits are not quota.
fn is_quota_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("quota")
        || (lower.contains("monthly") && lower.contains("limit"))
        || lower.contains("invocation limit")
}
