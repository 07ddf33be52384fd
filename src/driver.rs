//! The single task that owns a running stream.
//!
//! Every input (transport frames, the reconnect timer, the gap recovery
//! result and the shutdown signal) is awaited from one `select!`, so handlers
//! never interleave and no locking of session state is needed.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokio::sync::oneshot;
use tokio::time::Sleep;

use crate::backoff::BackoffPolicy;
use crate::config::StreamConfig;
use crate::error::{StreamError, TransportError};
use crate::event::StreamEvent;
use crate::frame::{parse_frame, Frame};
use crate::gap::{GapRecoveryTask, Observation};
use crate::listener::{dispatch, Listeners};
use crate::machine::{ConnectionMachine, ConnectionState, StateChange};
use crate::recovery::RecoveryFetcher;
use crate::session::StreamSession;
use crate::stats::StatsCounters;
use crate::transport::{ConnectRequest, EventTransport, FrameStream};

type RecoveryFuture = BoxFuture<'static, Result<Vec<StreamEvent>, StreamError>>;

enum Phase {
    Connecting(BoxFuture<'static, Result<FrameStream, TransportError>>),
    Connected(FrameStream),
    Reconnecting(Pin<Box<Sleep>>),
    /// Terminal `Error` state; only shutdown leaves it.
    Halted,
}

enum Input {
    Shutdown,
    Opened(Result<FrameStream, TransportError>),
    Frame(Result<String, TransportError>),
    Closed,
    RetryDue,
    Recovered(Result<Vec<StreamEvent>, StreamError>),
}

impl Phase {
    async fn next_input(&mut self) -> Input {
        match self {
            Phase::Connecting(open) => Input::Opened(open.await),
            Phase::Connected(frames) => match frames.next().await {
                Some(frame) => Input::Frame(frame),
                None => Input::Closed,
            },
            Phase::Reconnecting(timer) => {
                timer.as_mut().await;
                Input::RetryDue
            }
            Phase::Halted => std::future::pending().await,
        }
    }
}

async fn recovered(fetch: &mut Option<RecoveryFuture>) -> Result<Vec<StreamEvent>, StreamError> {
    match fetch.as_mut() {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

pub(crate) struct Driver {
    pub(crate) task_id: Arc<str>,
    pub(crate) config: StreamConfig,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) transport: Arc<dyn EventTransport>,
    pub(crate) fetcher: RecoveryFetcher,
    pub(crate) machine: ConnectionMachine,
    pub(crate) session: StreamSession,
    pub(crate) recovery: GapRecoveryTask,
    pub(crate) fetch: Option<RecoveryFuture>,
    pub(crate) resume_from: Option<u64>,
    pub(crate) listeners: Arc<Mutex<Listeners>>,
    pub(crate) stats: Arc<StatsCounters>,
}

impl Driver {
    pub(crate) async fn run(mut self, started: StateChange, mut shutdown: oneshot::Receiver<()>) {
        dispatch(&self.listeners, |listeners| listeners.state_change(started));
        let mut phase = self.open();

        loop {
            let input = tokio::select! {
                biased;
                _ = &mut shutdown => Input::Shutdown,
                result = recovered(&mut self.fetch), if self.fetch.is_some() => Input::Recovered(result),
                input = phase.next_input() => input,
            };

            match input {
                Input::Shutdown => {
                    drop(phase);
                    self.shut_down();
                    return;
                }
                Input::Recovered(result) => self.on_recovered(result),
                Input::Opened(Ok(frames)) => {
                    self.on_opened();
                    phase = Phase::Connected(frames);
                }
                Input::Opened(Err(error)) | Input::Frame(Err(error)) => {
                    phase = self.on_transport_failure(error);
                }
                Input::Frame(Ok(text)) => {
                    if let Some(next) = self.on_frame(&text) {
                        phase = next;
                    }
                }
                Input::Closed => phase = self.on_transport_failure(TransportError::closed()),
                Input::RetryDue => phase = self.open(),
            }
        }
    }

    fn open(&mut self) -> Phase {
        self.transition(ConnectionState::Connecting);

        let request = ConnectRequest {
            task_id: self.task_id.to_string(),
            since_seq: self
                .resume_from
                .take()
                .unwrap_or_else(|| self.session.last_seq()),
            batch_size: self.config.batch_size,
            flush_interval: self.config.flush_interval,
        };
        tracing::info!(
            task_id = %self.task_id,
            since_seq = request.since_seq,
            attempt = self.session.reconnect_attempts(),
            "opening event stream"
        );

        Phase::Connecting(self.transport.open(&request))
    }

    fn on_opened(&mut self) {
        self.session.connected(&self.backoff);
        self.transition(ConnectionState::Connected);
        tracing::info!(task_id = %self.task_id, "event stream connected");
    }

    fn on_transport_failure(&mut self, error: TransportError) -> Phase {
        tracing::warn!(
            task_id = %self.task_id,
            state = %self.machine.state(),
            error = %error,
            "event stream transport failed"
        );

        if !self.config.auto_reconnect {
            self.report(StreamError::Transport(error));
            self.transition(ConnectionState::Error);
            return Phase::Halted;
        }

        let attempts = self.session.reconnect_attempts();
        if attempts >= self.config.max_reconnect_attempts {
            self.report(StreamError::ReconnectExhausted {
                attempts,
                last_error: error.to_string(),
            });
            self.transition(ConnectionState::Error);
            return Phase::Halted;
        }

        let (attempt, delay) = self.session.schedule_retry(&self.backoff);
        self.stats.reconnect();
        self.transition(ConnectionState::Reconnecting);
        tracing::info!(
            task_id = %self.task_id,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        Phase::Reconnecting(Box::pin(tokio::time::sleep(delay)))
    }

    fn on_frame(&mut self, text: &str) -> Option<Phase> {
        match parse_frame(text) {
            Ok(Frame::Event(event)) => {
                self.on_live_event(event);
                None
            }
            Ok(Frame::Reconnect { reason, last_seq }) => {
                Some(self.on_reconnect_requested(reason, last_seq))
            }
            Ok(Frame::Error { message }) => {
                self.report(StreamError::ServerError { message });
                None
            }
            Err(error) => {
                self.report(error);
                None
            }
        }
    }

    fn on_reconnect_requested(&mut self, reason: Option<String>, last_seq: Option<u64>) -> Phase {
        let ours = self.session.last_seq();
        let resume = last_seq.map_or(ours, |theirs| theirs.min(ours));
        tracing::info!(
            task_id = %self.task_id,
            reason = reason.as_deref().unwrap_or("unspecified"),
            resume_from = resume,
            "server requested reconnect"
        );

        self.resume_from = Some(resume);
        self.stats.reconnect();
        self.transition(ConnectionState::Reconnecting);
        Phase::Reconnecting(Box::pin(tokio::time::sleep(Duration::ZERO)))
    }

    fn on_live_event(&mut self, event: StreamEvent) {
        let observation = self.session.observe(event.seq);

        if !self.config.gap_detection {
            self.deliver(&event);
            return;
        }

        match observation {
            Observation::InOrder => self.deliver(&event),
            Observation::Gap { missing } => {
                tracing::info!(
                    task_id = %self.task_id,
                    seq = event.seq,
                    missing_from = missing.start,
                    missing_until = missing.end,
                    "sequence gap detected"
                );
                self.stats.gap_detected();
                self.recovery.record(missing);
                self.deliver(&event);
                self.dispatch_recovery();
            }
            Observation::Behind => {
                if self.recovery.claim(event.seq) {
                    self.deliver(&event);
                } else {
                    self.stats.duplicate_dropped();
                    tracing::debug!(task_id = %self.task_id, seq = event.seq, "dropping duplicate event");
                }
            }
        }
    }

    fn dispatch_recovery(&mut self) {
        let Some(batch) = self.recovery.dispatch() else {
            return;
        };
        tracing::debug!(
            task_id = %self.task_id,
            since = batch.since,
            until = batch.until,
            gaps = batch.gaps,
            "starting gap recovery"
        );
        self.fetch = Some(self.fetcher.fetch(batch.since, batch.until));
    }

    fn on_recovered(&mut self, result: Result<Vec<StreamEvent>, StreamError>) {
        self.fetch = None;
        let Some(batch) = self.recovery.in_flight() else {
            return;
        };

        match result {
            Ok(events) => {
                for event in events {
                    if self.recovery.claim(event.seq) {
                        self.stats.event_recovered();
                        self.deliver(&event);
                    }
                }
                self.recovery.complete();
                self.stats.gaps_recovered(batch.gaps);
            }
            Err(error) => {
                self.recovery.complete();
                self.report(error);
            }
        }

        self.dispatch_recovery();
    }

    fn deliver(&self, event: &StreamEvent) {
        self.stats.event_received();
        dispatch(&self.listeners, |listeners| listeners.event(event));
    }

    fn report(&self, error: StreamError) {
        tracing::warn!(task_id = %self.task_id, error = %error, "event stream error");
        self.stats.error();
        dispatch(&self.listeners, |listeners| listeners.error(&error));
    }

    fn transition(&mut self, next: ConnectionState) {
        match self.machine.transition(next) {
            Ok(Some(change)) => {
                dispatch(&self.listeners, |listeners| listeners.state_change(change));
            }
            Ok(None) => {}
            Err(error) => {
                tracing::error!(task_id = %self.task_id, error = %error, "rejected state transition");
            }
        }
    }

    fn shut_down(&mut self) {
        self.fetch = None;
        self.recovery.clear();
        self.transition(ConnectionState::Disconnected);
        tracing::info!(
            task_id = %self.task_id,
            last_seq = self.session.last_seq(),
            "event stream stopped"
        );
    }
}
