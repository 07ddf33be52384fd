//! Gap-free live event feed for backend task executors.
//!
//! A [`StreamClient`] consumes the best-effort, server-pushed event stream of
//! one task and hands its consumer a deduplicated sequence ordered by `seq`.
//! Transport drops are retried with exponential backoff, resuming from the
//! last seen sequence number. Holes in the sequence are backfilled from a
//! point-in-time query while live delivery continues.
//!
//! # Ordering guarantee
//! Without gaps, delivered `seq` values increase by exactly one. When a gap is
//! detected the event that revealed it is delivered immediately; the missing
//! events follow later, ascending, once recovery returns. No `seq` is ever
//! delivered twice.
//!
//! The network side is pluggable through [`EventTransport`] and [`EventQuery`].
//! `task_stream_http` provides the SSE/HTTP implementation.

pub mod backoff;
pub mod client;
pub mod config;
mod driver;
pub mod error;
pub mod event;
pub mod frame;
pub mod gap;
pub mod listener;
pub mod machine;
pub mod recovery;
pub mod session;
pub mod stats;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use client::StreamClient;
pub use config::StreamConfig;
pub use error::{QueryError, StreamError, TransportError};
pub use event::StreamEvent;
pub use listener::StreamObserver;
pub use machine::ConnectionState;
pub use stats::StreamStats;
pub use transport::{ConnectRequest, EventQuery, EventTransport, FrameStream};
