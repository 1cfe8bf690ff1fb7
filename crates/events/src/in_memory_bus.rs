//! In-memory event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, EventHandler, HandlerRegistration, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Handlers run inline, in registration order, outside the internal lock
///   (a handler may add or remove handlers, or publish again)
/// - Dead subscribers are dropped while publishing
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    handlers: Mutex<Vec<(HandlerRegistration, EventHandler<M>)>>,
    next_registration: AtomicU64,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered synchronous handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            handlers: Mutex::new(Vec::new()),
            next_registration: AtomicU64::new(1),
        }
    }
}

impl<M> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let handlers: Vec<EventHandler<M>> = {
            let guard = self.handlers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
            guard.iter().map(|(_, h)| h.clone()).collect()
        };

        for handler in handlers {
            handler(&message);
        }

        let mut subs = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }

    fn add_handler(&self, handler: EventHandler<M>) -> HandlerRegistration {
        let registration =
            HandlerRegistration(self.next_registration.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.push((registration, handler));
        }
        registration
    }

    fn remove_handler(&self, registration: HandlerRegistration) -> bool {
        let Ok(mut handlers) = self.handlers.lock() else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(r, _)| *r != registration);
        handlers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_published_messages_in_order() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe();

        bus.publish(1u32).unwrap();
        bus.publish(2u32).unwrap();

        assert_eq!(sub.drain(), vec![1, 2]);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = InMemoryEventBus::new();
        drop(bus.subscribe());
        bus.publish("x".to_string()).unwrap();
        assert!(bus.subscribers.lock().unwrap().is_empty());
    }

    #[test]
    fn handlers_run_inline_until_removed() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let registration = bus.add_handler(Arc::new(move |m: &u32| sink.lock().unwrap().push(*m)));

        bus.publish(7).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![7]);

        assert!(bus.remove_handler(registration));
        assert!(!bus.remove_handler(registration));

        bus.publish(8).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn handler_may_publish_reentrantly() {
        let bus = Arc::new(InMemoryEventBus::<u32>::new());
        let sub = bus.subscribe();

        let inner = Arc::downgrade(&bus);
        bus.add_handler(Arc::new(move |m: &u32| {
            if *m == 1 {
                if let Some(bus) = inner.upgrade() {
                    bus.publish(2).unwrap();
                }
            }
        }));

        bus.publish(1).unwrap();
        let mut got = sub.drain();
        got.sort();
        assert_eq!(got, vec![1, 2]);
    }
}
