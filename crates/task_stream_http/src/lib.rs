//! HTTP transport for `task_stream`.
//!
//! [`HttpEventSource`] implements both capability seams of the client core:
//! the live feed is read as server-sent events from
//! `{base}/tasks/{id}/events/stream`, and recovery pages come from the JSON
//! endpoint `{base}/tasks/{id}/events`.
//!
//! Nothing here retries. Reconnect and recovery policy live in
//! [`task_stream::StreamClient`].

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod sse;
pub mod url;

pub use client::HttpEventSource;
pub use config::HttpConfig;
pub use error::HttpError;
pub use sse::{InvalidFrame, SseFrameParser};
pub use url::normalize_base_url;
