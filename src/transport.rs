//! Capability seams between the client core and concrete network code.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::error::{QueryError, TransportError};
use crate::event::StreamEvent;

/// Text frames of one open connection. The stream ending means the server
/// closed the connection; dropping it closes the connection from our side.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Parameters for opening the live stream of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub task_id: String,
    /// Resume point, exclusive.
    pub since_seq: u64,
    pub batch_size: u32,
    pub flush_interval: Duration,
}

/// Push-based live event channel.
pub trait EventTransport: Send + Sync + 'static {
    /// Open a connection. Resolving to `Ok` means the connection is open.
    fn open(&self, request: &ConnectRequest)
        -> BoxFuture<'static, Result<FrameStream, TransportError>>;
}

/// Point-in-time retrieval of a task's event history.
pub trait EventQuery: Send + Sync + 'static {
    /// Up to `limit` events with `seq > since_seq`, ascending by `seq`.
    fn events_since(
        &self,
        task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> BoxFuture<'static, Result<Vec<StreamEvent>, QueryError>>;
}

impl<T: EventTransport + ?Sized> EventTransport for Arc<T> {
    fn open(
        &self,
        request: &ConnectRequest,
    ) -> BoxFuture<'static, Result<FrameStream, TransportError>> {
        (**self).open(request)
    }
}

impl<Q: EventQuery + ?Sized> EventQuery for Arc<Q> {
    fn events_since(
        &self,
        task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> BoxFuture<'static, Result<Vec<StreamEvent>, QueryError>> {
        (**self).events_since(task_id, since_seq, limit)
    }
}
