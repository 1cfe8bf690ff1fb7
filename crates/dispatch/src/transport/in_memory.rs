//! In-memory transport for tests/dev.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use geomajas_core::{Command, CommandResponse};

use super::{CommandTransport, TransportError};

type Responder = Box<dyn Fn(&Command) -> Result<CommandResponse, TransportError> + Send + Sync>;

/// Transport answering from a local closure.
///
/// - No IO
/// - Records every command it receives, in arrival order
pub struct InMemoryTransport {
    responder: Responder,
    received: Mutex<Vec<Command>>,
}

impl InMemoryTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Command) -> Result<CommandResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Transport that answers every command with an empty success response.
    pub fn always_ok() -> Self {
        Self::new(|_| Ok(CommandResponse::default()))
    }

    /// Commands received so far.
    pub fn received(&self) -> Vec<Command> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl core::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandTransport for InMemoryTransport {
    async fn execute(&self, command: &Command) -> Result<CommandResponse, TransportError> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());
        (self.responder)(command)
    }
}
