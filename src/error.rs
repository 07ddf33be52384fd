use thiserror::Error;

use crate::machine::ConnectionState;

/// Failure reported by an [`EventTransport`](crate::EventTransport) while
/// opening a connection or reading frames from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP-like status when the transport had one to report.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Transport closed the connection without an error.
    #[must_use]
    pub fn closed() -> Self {
        Self::new("connection closed by server")
    }
}

/// Failure reported by an [`EventQuery`](crate::EventQuery).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub status: Option<u16>,
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to parse frame: {reason}")]
    Parse { reason: String, frame: String },

    #[error("server reported an error: {message}")]
    ServerError { message: String },

    #[error("gap recovery for ({since}, {until}) failed: {reason}")]
    RecoveryFailed {
        since: u64,
        until: u64,
        reason: String,
    },

    #[error("gave up reconnecting after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("illegal transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no tokio runtime available: {0}")]
    Runtime(String),
}

impl StreamError {
    #[must_use]
    pub fn parse(reason: impl Into<String>, frame: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            frame: frame.into(),
        }
    }

    #[must_use]
    pub fn recovery_failed(since: u64, until: u64, reason: impl Into<String>) -> Self {
        Self::RecoveryFailed {
            since,
            until,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }
}
