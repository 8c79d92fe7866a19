use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Coarse classification of a proxy outcome, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MissingUrl,
    InvalidUrl,
    InvalidHeader,
    InvalidAuth,
    InvalidRequestBody,
    NetworkFailure,
    Timeout,
    TooManyRedirects,
    /// Not an error: the body was returned as text after a failed JSON parse.
    DecodeFallback,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::MissingUrl => "MISSING_URL",
            ErrorKind::InvalidUrl => "INVALID_URL",
            ErrorKind::InvalidHeader => "INVALID_HEADER",
            ErrorKind::InvalidAuth => "INVALID_AUTH",
            ErrorKind::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorKind::NetworkFailure => "NETWORK_FAILURE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::TooManyRedirects => "TOO_MANY_REDIRECTS",
            ErrorKind::DecodeFallback => "DECODE_FALLBACK",
        }
    }
}

/// Where in the outbound call a network failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    Dns,
    Connect,
    Tls,
    Protocol,
    Body,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureCategory::Dns => "dns",
            FailureCategory::Connect => "connect",
            FailureCategory::Tls => "tls",
            FailureCategory::Protocol => "protocol",
            FailureCategory::Body => "body",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Please enter a URL")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid authorization: {0}")]
    InvalidAuth(String),

    #[error("Request body is not valid JSON: {0}")]
    InvalidRequestBody(#[from] serde_json::Error),

    #[error("Network failure ({category}): {message}")]
    Network {
        category: FailureCategory,
        message: String,
    },

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },
}

impl ProxyError {
    pub fn network(category: FailureCategory, message: impl Into<String>) -> Self {
        ProxyError::Network {
            category,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::MissingUrl => ErrorKind::MissingUrl,
            ProxyError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ProxyError::InvalidHeader(_) => ErrorKind::InvalidHeader,
            ProxyError::InvalidAuth(_) => ErrorKind::InvalidAuth,
            ProxyError::InvalidRequestBody(_) => ErrorKind::InvalidRequestBody,
            ProxyError::Network { .. } => ErrorKind::NetworkFailure,
            ProxyError::Timeout { .. } => ErrorKind::Timeout,
            ProxyError::TooManyRedirects { .. } => ErrorKind::TooManyRedirects,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// True for errors raised before any network activity.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ProxyError::MissingUrl
                | ProxyError::InvalidUrl(_)
                | ProxyError::InvalidHeader(_)
                | ProxyError::InvalidAuth(_)
                | ProxyError::InvalidRequestBody(_)
        )
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let ProxyError::Network { category, .. } = &self {
            body["category"] = json!(category);
        }

        (status, Json(body)).into_response()
    }
}
