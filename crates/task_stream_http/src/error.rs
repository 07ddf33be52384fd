use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use task_stream::{QueryError, TransportError};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("malformed response body: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status, _) => Some(status.as_u16()),
            Self::Request(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

impl From<HttpError> for TransportError {
    fn from(error: HttpError) -> Self {
        match error.status() {
            Some(status) => TransportError::with_status(status, error.to_string()),
            None => TransportError::new(error.to_string()),
        }
    }
}

impl From<HttpError> for QueryError {
    fn from(error: HttpError) -> Self {
        match error.status() {
            Some(status) => QueryError::with_status(status, error.to_string()),
            None => QueryError::new(error.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<Value>,
    message: Option<String>,
}

/// Extract a human readable message from an error response body.
///
/// Understands `{"error":{"message":..}}`, `{"error":".."}` and
/// `{"message":".."}`; anything else falls back to the raw body, or the
/// canonical reason when the body is empty.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return fallback();
    };

    let from_error = match parsed.error {
        Some(Value::String(message)) => non_empty(message),
        Some(Value::Object(fields)) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .and_then(non_empty),
        _ => None,
    };

    from_error
        .or_else(|| parsed.message.and_then(non_empty))
        .unwrap_or_else(fallback)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
