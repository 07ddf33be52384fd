use serde_json::Value;

use crate::error::StreamError;
use crate::event::StreamEvent;

/// Decoded text frame from the live transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    /// Server asks the client to reconnect, resuming after `last_seq`.
    Reconnect {
        reason: Option<String>,
        last_seq: Option<u64>,
    },
    /// Server-side fault report.
    Error { message: String },
}

/// Decode one JSON text frame.
pub fn parse_frame(text: &str) -> Result<Frame, StreamError> {
    let value = serde_json::from_str::<Value>(text)
        .map_err(|error| StreamError::parse(error.to_string(), text))?;

    if !value.is_object() {
        return Err(StreamError::parse("frame is not a JSON object", text));
    }

    match value.get("type").and_then(Value::as_str) {
        Some("reconnect") => Ok(Frame::Reconnect {
            reason: value
                .get("reason")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            last_seq: value.get("last_seq").and_then(Value::as_u64),
        }),
        Some("error") => Ok(Frame::Error {
            message: error_message(value.get("error")),
        }),
        _ => serde_json::from_value::<StreamEvent>(value)
            .map(Frame::Event)
            .map_err(|error| StreamError::parse(error.to_string(), text)),
    }
}

fn error_message(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(message)) if !message.trim().is_empty() => message.clone(),
        Some(Value::Object(fields)) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| Value::Object(fields.clone()).to_string()),
        Some(Value::Null) | None => "unknown server error".to_owned(),
        Some(other) => other.to_string(),
    }
}
