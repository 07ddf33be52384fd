use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event from a task's history, as streamed live or recovered by query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Producer-assigned timestamp. Display only, never used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Any additional top-level fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamEvent {
    pub fn new(seq: u64, event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            seq,
            event_type: event_type.into(),
            payload,
            created_at: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }
}
