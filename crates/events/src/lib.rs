//! `geomajas-events`: publish/subscribe mechanics and dispatcher lifecycle events.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, EventHandler, HandlerRegistration, Subscription};
pub use event::DispatcherEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
