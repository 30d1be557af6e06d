use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The request never produced a response. The underlying error is passed
    /// through untouched so callers can inspect timeouts, DNS failures, etc.
    #[error("HTTP transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A response was received but the exchange rejected the request.
    #[error("API error: {0}")]
    Api(Box<ApiError>),

    /// A wire value has no counterpart in one of the closed mapping tables.
    #[error("No OKX mapping for {kind} '{value}'")]
    UnmappedValue { kind: &'static str, value: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("WebSocket session is no longer running")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    pub(crate) fn unmapped(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnmappedValue {
            kind,
            value: value.into(),
        }
    }

    /// Exchange error code, if this error carries one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(api) => Some(api.code.as_str()),
            _ => None,
        }
    }
}

impl From<ApiError> for ExchangeError {
    fn from(error: ApiError) -> Self {
        Self::Api(Box::new(error))
    }
}

/// Normalized view of a rejected REST call.
///
/// Carries the exchange's `code`/`msg` pair along with the raw response and
/// the request that produced it, so a failure can be reproduced from the
/// error value alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub method: String,
    pub request_url: String,
    pub request_body: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({} {})",
            self.code, self.message, self.method, self.request_url
        )
    }
}

impl std::error::Error for ApiError {}
