use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::{debug, error};
use uuid::Uuid;

use crate::{models::PurchaseState, platform::UserNotifier};

type Listener = Arc<dyn Fn(&PurchaseState) + Send + Sync>;

/// Handle returned by [`StateHub::observe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Single source of truth for the purchase state.
///
/// Holds the current [`PurchaseState`], the registered listeners and the
/// user-facing message sink. Once closed, every mutation is dropped.
///
/// Writes and their notifications are serialized, so listeners see
/// transitions in write order. Listeners may read the state but must not
/// mutate it from inside the callback.
pub struct StateHub {
    state: Mutex<PurchaseState>,
    // Held across a write and its listener calls
    notify: Mutex<()>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    closed: AtomicBool,
    notifier: Arc<dyn UserNotifier>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateHub {
    pub fn new(notifier: Arc<dyn UserNotifier>) -> Self {
        Self {
            state: Mutex::new(PurchaseState::NotStarted),
            notify: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn current(&self) -> PurchaseState {
        lock(&self.state).clone()
    }

    /// Register a listener invoked after every state change.
    pub fn observe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&PurchaseState) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        lock(&self.listeners).push((id, Arc::new(listener)));
        debug!(listener_id = %id, "State listener registered");
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unobserve(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    /// Replace the state and notify listeners. No-op once the hub is closed.
    pub fn transition(&self, next: PurchaseState) -> bool {
        self.transition_if(|_| true, next)
    }

    /// Replace the state only when `predicate` holds for the current one.
    pub fn transition_if<P>(&self, predicate: P, next: PurchaseState) -> bool
    where
        P: FnOnce(&PurchaseState) -> bool,
    {
        let _notifying = lock(&self.notify);
        let snapshot = {
            let mut state = lock(&self.state);
            if self.is_closed() || !predicate(&*state) {
                return false;
            }
            debug!(from = %*state, to = %next, "Purchase state transition");
            *state = next;
            state.clone()
        };

        // Only the state lock is released here, so listeners may read the state back.
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
        true
    }

    /// Show a message to the user unless the hub is closed.
    pub fn show_message(&self, message: &str) {
        if !self.is_closed() {
            self.notifier.show(message);
        }
    }

    /// Shared path for every user-visible failure: log, tell the user, move to `Error`.
    pub fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        error!(reason = %message, "Purchase failed");
        if self.is_closed() {
            debug!("State hub closed, error not surfaced");
            return;
        }
        self.notifier.show(&message);
        self.transition(PurchaseState::Error(message));
    }

    /// Stop accepting mutations. Returns true on the first call only.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
