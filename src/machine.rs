use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::StreamError;

/// Lifecycle state of the single logical connection owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        if self == next || next == Disconnected {
            return true;
        }

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connecting, Error)
                | (Connected, Reconnecting)
                | (Connected, Error)
                | (Reconnecting, Connecting)
                | (Reconnecting, Error)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub current: ConnectionState,
    pub previous: ConnectionState,
}

/// Arbitrates state transitions and publishes the current state to readers.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    publisher: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionMachine {
    pub fn new(publisher: Arc<watch::Sender<ConnectionState>>) -> Self {
        let state = *publisher.borrow();
        Self { state, publisher }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Returns `Ok(None)` for a no-op transition so callers
    /// can suppress duplicate notifications.
    pub fn transition(
        &mut self,
        next: ConnectionState,
    ) -> Result<Option<StateChange>, StreamError> {
        if !self.state.can_transition_to(next) {
            return Err(StreamError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        if self.state == next {
            return Ok(None);
        }

        let previous = std::mem::replace(&mut self.state, next);
        self.publisher.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "connection state changed");

        Ok(Some(StateChange {
            current: next,
            previous,
        }))
    }
}
