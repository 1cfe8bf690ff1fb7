//! Transport seam between the dispatcher and the command service.
//!
//! The dispatcher only knows the [`CommandTransport`] trait: one call that
//! takes a stamped [`Command`] and eventually yields a [`CommandResponse`] or a
//! [`TransportError`]. A transport error means "no response"; a response that
//! reports server-side exceptions is still `Ok`.

use async_trait::async_trait;
use thiserror::Error;

use geomajas_core::{Command, CommandResponse};

pub mod http;
pub mod in_memory;

pub use http::HttpTransport;
pub use in_memory::InMemoryTransport;

/// Transport-level failure: the command produced no usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request never reached the service or the connection broke.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-success HTTP status.
    #[error("service error ({0}): {1}")]
    Status(u16, String),

    /// The response body could not be decoded into a response envelope.
    #[error("decode error: {0}")]
    Decode(String),

    /// No async runtime was available to drive the request.
    #[error("no async runtime available to send the command")]
    NoRuntime,
}

/// Sends one command to the command service.
///
/// Implementations must be `Send + Sync`; the dispatcher shares one transport
/// between all in-flight requests.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn execute(&self, command: &Command) -> Result<CommandResponse, TransportError>;
}

#[async_trait]
impl<T> CommandTransport for std::sync::Arc<T>
where
    T: CommandTransport + ?Sized,
{
    async fn execute(&self, command: &Command) -> Result<CommandResponse, TransportError> {
        (**self).execute(command).await
    }
}
