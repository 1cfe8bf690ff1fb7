//! The callback bundle attached to one in-flight command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use geomajas_core::DeferredId;

use crate::callback::{CommandCallback, ErrorCallback};
use crate::transport::TransportError;

struct DeferredState {
    callbacks: Vec<CommandCallback>,
    error_callbacks: Vec<ErrorCallback>,
    cancelled: bool,
    log_communication_exceptions: bool,
}

/// Shared handle on the callbacks of one command.
///
/// Cloning is cheap and every clone observes the same state: the caller keeps
/// one to cancel, the dispatcher holds another while the request is in flight
/// (and while it waits in a retry queue). A retried command reuses the same
/// `Deferred`, so callbacks and cancellation survive the retry.
///
/// Once cancelled, [`Deferred::callbacks`] is always empty: no callback fires
/// after cancellation. Cancelling does not abort the network request.
#[derive(Clone)]
pub struct Deferred {
    id: DeferredId,
    state: Arc<Mutex<DeferredState>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self {
            id: DeferredId::new(),
            state: Arc::new(Mutex::new(DeferredState {
                callbacks: Vec::new(),
                error_callbacks: Vec::new(),
                cancelled: false,
                log_communication_exceptions: true,
            })),
        }
    }

    /// New deferred with one callback already registered.
    pub fn with_callback(callback: CommandCallback) -> Self {
        let deferred = Self::new();
        deferred.add_callback(callback);
        deferred
    }

    pub fn id(&self) -> DeferredId {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, DeferredState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a callback. No de-duplication.
    pub fn add_callback(&self, callback: CommandCallback) {
        self.state().callbacks.push(callback);
    }

    /// Append a legacy error-only callback.
    pub fn add_error_callback<F>(&self, f: F)
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.state().error_callbacks.push(Arc::new(f));
    }

    /// Clear all callbacks and mark as cancelled. Idempotent.
    pub fn cancel(&self) {
        let mut state = self.state();
        state.callbacks.clear();
        state.error_callbacks.clear();
        state.cancelled = true;
    }

    /// Snapshot of the registered callbacks, or empty once cancelled.
    pub fn callbacks(&self) -> Vec<CommandCallback> {
        let state = self.state();
        if state.cancelled {
            Vec::new()
        } else {
            state.callbacks.clone()
        }
    }

    pub fn error_callbacks(&self) -> Vec<ErrorCallback> {
        let state = self.state();
        if state.cancelled {
            Vec::new()
        } else {
            state.error_callbacks.clone()
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().cancelled
    }

    pub fn is_log_communication_exceptions(&self) -> bool {
        self.state().log_communication_exceptions
    }

    pub fn set_log_communication_exceptions(&self, log: bool) {
        self.state().log_communication_exceptions = log;
    }

    /// True if both handles point at the same deferred.
    pub fn same_as(&self, other: &Deferred) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state();
        f.debug_struct("Deferred")
            .field("id", &self.id)
            .field("callbacks", &state.callbacks.len())
            .field("cancelled", &state.cancelled)
            .finish()
    }
}
