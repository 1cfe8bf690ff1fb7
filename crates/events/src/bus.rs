//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the pub/sub seam used to announce dispatcher state
//! transitions (dispatch started/stopped, token changed) to interested parties
//! such as loading indicators or login widgets.
//!
//! ## Delivery model
//!
//! - **Synchronous handlers** run inline on the publishing thread, at the point
//!   of the state transition. They must not block.
//! - **Subscriptions** receive a clone of every message over a channel and can be
//!   drained from any thread.
//! - No batching and no persistence: a message published with nobody listening
//!   is gone.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics).
///
/// ```ignore
/// let subscription = dispatcher.events().subscribe();
/// while let Ok(event) = subscription.recv_timeout(Duration::from_secs(1)) {
///     render_busy_indicator(&event);
/// }
/// ```
///
/// Messages arrive in the order they were published.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every message currently buffered, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Opaque token returned by [`EventBus::add_handler`]; pass it back to
/// [`EventBus::remove_handler`] to unregister.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HandlerRegistration(pub(crate) u64);

/// Synchronous event handler.
pub type EventHandler<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Transport-agnostic event bus.
///
/// `publish()` can fail (e.g. internal lock poisoning). Callers that cannot do
/// anything useful with the failure log it and carry on.
///
/// The trait requires `Send + Sync`: the dispatcher publishes from whichever
/// runtime thread completes a request.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;

    /// Register a handler invoked inline for every published message.
    fn add_handler(&self, handler: EventHandler<M>) -> HandlerRegistration;

    /// Unregister a handler. Returns `false` if it was not registered.
    fn remove_handler(&self, registration: HandlerRegistration) -> bool;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }

    fn add_handler(&self, handler: EventHandler<M>) -> HandlerRegistration {
        (**self).add_handler(handler)
    }

    fn remove_handler(&self, registration: HandlerRegistration) -> bool {
        (**self).remove_handler(registration)
    }
}
