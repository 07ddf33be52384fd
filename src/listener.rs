use std::sync::{Mutex, MutexGuard};

use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::machine::{ConnectionState, StateChange};

pub type EventHandler = Box<dyn FnMut(&StreamEvent) + Send>;
pub type StateHandler = Box<dyn FnMut(ConnectionState, ConnectionState) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&StreamError) + Send>;

/// Receives everything a client delivers.
///
/// Methods run on the client's driver task, one at a time and in order. They
/// must return promptly: the next frame is not processed until they do.
pub trait StreamObserver: Send {
    fn on_event(&mut self, _event: &StreamEvent) {}

    fn on_state_change(&mut self, _current: ConnectionState, _previous: ConnectionState) {}

    fn on_error(&mut self, _error: &StreamError) {}
}

#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) event: Option<EventHandler>,
    pub(crate) state: Option<StateHandler>,
    pub(crate) error: Option<ErrorHandler>,
    pub(crate) observers: Vec<Box<dyn StreamObserver>>,
}

impl Listeners {
    pub(crate) fn event(&mut self, event: &StreamEvent) {
        if let Some(handler) = self.event.as_mut() {
            handler(event);
        }
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }

    pub(crate) fn state_change(&mut self, change: StateChange) {
        if let Some(handler) = self.state.as_mut() {
            handler(change.current, change.previous);
        }
        for observer in &mut self.observers {
            observer.on_state_change(change.current, change.previous);
        }
    }

    pub(crate) fn error(&mut self, error: &StreamError) {
        if let Some(handler) = self.error.as_mut() {
            handler(error);
        }
        for observer in &mut self.observers {
            observer.on_error(error);
        }
    }
}

impl Listeners {
    /// Put back handlers taken by [`dispatch`]. Slots filled while they were
    /// out keep the newer handler; observers added meanwhile go last.
    fn restore(&mut self, taken: Listeners) {
        if self.event.is_none() {
            self.event = taken.event;
        }
        if self.state.is_none() {
            self.state = taken.state;
        }
        if self.error.is_none() {
            self.error = taken.error;
        }
        let added = std::mem::replace(&mut self.observers, taken.observers);
        self.observers.extend(added);
    }
}

/// Run `notify` with the registered handlers moved out of the shared slots,
/// so a handler may register listeners on its own client without
/// deadlocking.
pub(crate) fn dispatch(listeners: &Mutex<Listeners>, notify: impl FnOnce(&mut Listeners)) {
    let mut taken = std::mem::take(&mut *lock_unpoisoned(listeners));
    notify(&mut taken);
    lock_unpoisoned(listeners).restore(taken);
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
