//! `geomajas-dispatch`: asynchronous command dispatch for map clients.
//!
//! **Responsibility:** send commands to the map server's command service,
//! route each outcome to the caller's callbacks, and transparently renew the
//! session when the server reports missing or invalid credentials.
//!
//! This crate provides:
//! - [`Deferred`] / [`CommandCallback`]: the per-command callback bundle
//! - [`Dispatcher`]: the context object every call site shares
//! - [`TokenRequestHandler`]: the application hook that obtains a new token
//! - [`CommandTransport`]: the seam to the wire ([`HttpTransport`], [`InMemoryTransport`])

pub mod callback;
pub mod config;
pub mod deferred;
pub mod dispatcher;
pub mod login;
pub mod presenter;
pub mod transport;

pub use callback::{CommandCallback, ErrorCallback, ResponseHandler, TransportErrorHandler};
pub use config::{ConfigError, DispatcherConfig};
pub use deferred::Deferred;
pub use dispatcher::{Dispatch, Dispatcher};
pub use login::{TokenNotifier, TokenRequestHandler};
pub use presenter::{ErrorPresenter, LogErrorPresenter};
pub use transport::{CommandTransport, HttpTransport, InMemoryTransport, TransportError};
