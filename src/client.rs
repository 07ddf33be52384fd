use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::StreamConfig;
use crate::driver::Driver;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::gap::GapRecoveryTask;
use crate::listener::{lock_unpoisoned, Listeners, StreamObserver};
use crate::machine::{ConnectionMachine, ConnectionState};
use crate::recovery::RecoveryFetcher;
use crate::session::StreamSession;
use crate::stats::{StatsCounters, StreamStats};
use crate::transport::{EventQuery, EventTransport};

struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Live, gap-free event feed for one task.
///
/// Events, state changes and errors are delivered to the registered
/// listeners from a driver task spawned on the current tokio runtime by
/// [`start`](Self::start). Listeners run one at a time. Registering from
/// inside a callback is allowed and takes effect from the next notification.
pub struct StreamClient {
    task_id: Arc<str>,
    config: StreamConfig,
    transport: Arc<dyn EventTransport>,
    query: Arc<dyn EventQuery>,
    listeners: Arc<Mutex<Listeners>>,
    state: Arc<watch::Sender<ConnectionState>>,
    stats: Arc<StatsCounters>,
    running: Option<Running>,
}

impl StreamClient {
    pub fn new(
        task_id: impl Into<Arc<str>>,
        config: StreamConfig,
        transport: Arc<dyn EventTransport>,
        query: Arc<dyn EventQuery>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            task_id: task_id.into(),
            config,
            transport,
            query,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            state: Arc::new(state),
            stats: Arc::new(StatsCounters::default()),
            running: None,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state changes without registering a callback.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub fn on_event<F>(&self, handler: F)
    where
        F: FnMut(&StreamEvent) + Send + 'static,
    {
        lock_unpoisoned(&self.listeners).event = Some(Box::new(handler));
    }

    /// `handler(current, previous)` runs for every actual state change.
    pub fn on_state_change<F>(&self, handler: F)
    where
        F: FnMut(ConnectionState, ConnectionState) + Send + 'static,
    {
        lock_unpoisoned(&self.listeners).state = Some(Box::new(handler));
    }

    pub fn on_error<F>(&self, handler: F)
    where
        F: FnMut(&StreamError) + Send + 'static,
    {
        lock_unpoisoned(&self.listeners).error = Some(Box::new(handler));
    }

    pub fn add_observer(&self, observer: impl StreamObserver + 'static) {
        lock_unpoisoned(&self.listeners)
            .observers
            .push(Box::new(observer));
    }

    /// Begin streaming. Fails unless the client is `Disconnected`.
    pub fn start(&mut self) -> Result<(), StreamError> {
        let state = self.state();
        if self.running.is_some() || state != ConnectionState::Disconnected {
            return Err(StreamError::invalid_state("start", state));
        }
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| StreamError::Runtime(error.to_string()))?;

        let backoff = self.config.backoff();
        let mut machine = ConnectionMachine::new(Arc::clone(&self.state));
        let started = machine
            .transition(ConnectionState::Connecting)?
            .ok_or_else(|| StreamError::invalid_state("start", ConnectionState::Connecting))?;

        let driver = Driver {
            task_id: Arc::clone(&self.task_id),
            config: self.config.clone(),
            backoff,
            transport: Arc::clone(&self.transport),
            fetcher: RecoveryFetcher::new(
                Arc::clone(&self.query),
                Arc::clone(&self.task_id),
                self.config.recovery_page_size,
            ),
            machine,
            session: StreamSession::new(self.config.since_seq, &backoff),
            recovery: GapRecoveryTask::default(),
            fetch: None,
            resume_from: None,
            listeners: Arc::clone(&self.listeners),
            stats: Arc::clone(&self.stats),
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(driver.run(started, shutdown_rx));
        self.running = Some(Running { shutdown, handle });
        Ok(())
    }

    /// Stop streaming and return to `Disconnected`.
    ///
    /// Idempotent. Once this returns no listener is invoked again, including
    /// for a recovery fetch or reconnect timer that was pending.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(());
        if let Err(error) = running.handle.await {
            tracing::error!(task_id = %self.task_id, error = %error, "event stream driver failed");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("task_id", &self.task_id)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
