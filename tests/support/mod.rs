#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use serde_json::json;
use task_stream::{
    ConnectRequest, ConnectionState, EventQuery, EventTransport, FrameStream, QueryError,
    StreamClient, StreamConfig, StreamError, StreamEvent, TransportError,
};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Instant};

pub const TASK_ID: &str = "task-42";

type FrameSender = mpsc::UnboundedSender<Result<String, TransportError>>;

enum Script {
    Accept(mpsc::UnboundedReceiver<Result<String, TransportError>>),
    Refuse(TransportError),
}

/// Live side of a scripted connection, held by the test.
pub struct Connection {
    frames: FrameSender,
}

impl Connection {
    pub fn event(&self, seq: u64) {
        self.raw(&event_json(seq));
    }

    pub fn events(&self, seqs: &[u64]) {
        for seq in seqs {
            self.event(*seq);
        }
    }

    pub fn raw(&self, text: &str) {
        let _ = self.frames.send(Ok(text.to_owned()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.frames.send(Err(TransportError::new(message)));
    }

    /// Server closes the connection.
    pub fn close(self) {}
}

#[derive(Default)]
pub struct TransportTrace {
    scripts: VecDeque<Script>,
    pub requests: Vec<ConnectRequest>,
    pub opened_at: Vec<Instant>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    trace: Arc<Mutex<TransportTrace>>,
}

impl ScriptedTransport {
    pub fn accept(&self) -> Connection {
        let (frames, receiver) = mpsc::unbounded_channel();
        lock_unpoisoned(&self.trace)
            .scripts
            .push_back(Script::Accept(receiver));
        Connection { frames }
    }

    pub fn refuse(&self, message: &str) {
        lock_unpoisoned(&self.trace)
            .scripts
            .push_back(Script::Refuse(TransportError::with_status(503, message)));
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        lock_unpoisoned(&self.trace).requests.clone()
    }

    pub fn opened_at(&self) -> Vec<Instant> {
        lock_unpoisoned(&self.trace).opened_at.clone()
    }

    pub fn open_count(&self) -> usize {
        lock_unpoisoned(&self.trace).requests.len()
    }
}

impl EventTransport for ScriptedTransport {
    fn open(
        &self,
        request: &ConnectRequest,
    ) -> BoxFuture<'static, Result<FrameStream, TransportError>> {
        let mut trace = lock_unpoisoned(&self.trace);
        trace.requests.push(request.clone());
        trace.opened_at.push(Instant::now());
        let result = match trace.scripts.pop_front() {
            Some(Script::Accept(receiver)) => {
                let frames: FrameStream = futures_util::stream::unfold(receiver, |mut receiver| async move {
                    receiver.recv().await.map(|frame| (frame, receiver))
                })
                .boxed();
                Ok(frames)
            }
            Some(Script::Refuse(error)) => Err(error),
            None => Err(TransportError::new("no scripted connection left")),
        };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct QueryTrace {
    pub history: Vec<u64>,
    pub calls: Vec<(u64, u32)>,
    pub fail_with: Option<QueryError>,
    pub gate: Option<oneshot::Receiver<()>>,
}

/// Recovery query answering from an in-memory history of sequence numbers.
#[derive(Clone, Default)]
pub struct ScriptedQuery {
    trace: Arc<Mutex<QueryTrace>>,
}

impl ScriptedQuery {
    pub fn with_history(history: impl IntoIterator<Item = u64>) -> Self {
        let query = Self::default();
        lock_unpoisoned(&query.trace).history = history.into_iter().collect();
        query
    }

    pub fn failing(message: &str) -> Self {
        let query = Self::default();
        lock_unpoisoned(&query.trace).fail_with = Some(QueryError::with_status(500, message));
        query
    }

    /// Hold the next query until the returned sender fires or is dropped.
    pub fn gate(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        lock_unpoisoned(&self.trace).gate = Some(gate);
        release
    }

    pub fn calls(&self) -> Vec<(u64, u32)> {
        lock_unpoisoned(&self.trace).calls.clone()
    }
}

impl EventQuery for ScriptedQuery {
    fn events_since(
        &self,
        _task_id: &str,
        since_seq: u64,
        limit: u32,
    ) -> BoxFuture<'static, Result<Vec<StreamEvent>, QueryError>> {
        let mut trace = lock_unpoisoned(&self.trace);
        trace.calls.push((since_seq, limit));
        let gate = trace.gate.take();
        let result = match trace.fail_with.clone() {
            Some(error) => Err(error),
            None => Ok(trace
                .history
                .iter()
                .copied()
                .filter(|seq| *seq > since_seq)
                .take(limit as usize)
                .map(event)
                .collect()),
        };

        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            result
        })
    }
}

/// Everything a client delivered, in callback order per kind.
pub struct Recorder {
    pub events: mpsc::UnboundedReceiver<u64>,
    pub states: mpsc::UnboundedReceiver<(ConnectionState, ConnectionState)>,
    pub errors: mpsc::UnboundedReceiver<StreamError>,
}

impl Recorder {
    pub fn attach(client: &StreamClient) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, states) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        client.on_event(move |event| {
            let _ = event_tx.send(event.seq);
        });
        client.on_state_change(move |current, previous| {
            let _ = state_tx.send((current, previous));
        });
        client.on_error(move |error| {
            let _ = error_tx.send(error.clone());
        });

        Self {
            events,
            states,
            errors,
        }
    }

    pub async fn next_events(&mut self, count: usize) -> Vec<u64> {
        let mut seqs = Vec::with_capacity(count);
        while seqs.len() < count {
            seqs.push(within(self.events.recv()).await.expect("event channel open"));
        }
        seqs
    }

    pub async fn next_error(&mut self) -> StreamError {
        within(self.errors.recv()).await.expect("error channel open")
    }

    /// Wait until the client reports `target`, returning the changes seen.
    pub async fn wait_for_state(
        &mut self,
        target: ConnectionState,
    ) -> Vec<(ConnectionState, ConnectionState)> {
        let mut seen = Vec::new();
        loop {
            let change = within(self.states.recv()).await.expect("state channel open");
            seen.push(change);
            if change.0 == target {
                return seen;
            }
        }
    }

    pub fn drain_states(&mut self) -> Vec<(ConnectionState, ConnectionState)> {
        let mut seen = Vec::new();
        while let Ok(change) = self.states.try_recv() {
            seen.push(change);
        }
        seen
    }

    pub fn is_quiet(&mut self) -> bool {
        self.events.try_recv().is_err()
            && self.states.try_recv().is_err()
            && self.errors.try_recv().is_err()
    }
}

pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    timeout(Duration::from_secs(60), future)
        .await
        .expect("timed out waiting for client output")
}

pub fn client(
    config: StreamConfig,
    transport: &ScriptedTransport,
    query: &ScriptedQuery,
) -> StreamClient {
    StreamClient::new(
        TASK_ID,
        config,
        Arc::new(transport.clone()),
        Arc::new(query.clone()),
    )
}

pub fn fast_config() -> StreamConfig {
    StreamConfig::default()
        .with_reconnect_delay(Duration::from_millis(100))
        .with_max_reconnect_delay(Duration::from_millis(1000))
        .with_reconnect_backoff(2.0)
}

pub fn event(seq: u64) -> StreamEvent {
    StreamEvent::new(seq, "task.progress", json!({ "seq": seq }))
}

pub fn event_json(seq: u64) -> String {
    serde_json::to_string(&event(seq)).expect("event should serialize")
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
