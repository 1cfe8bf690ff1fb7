//! Command callbacks.
//!
//! A [`CommandCallback`] carries up to three explicitly registered handlers,
//! one per outcome of a command:
//!
//! - `success`: the service answered without errors
//! - `command_exception`: the service answered with structured exceptions
//! - `communication_exception`: no response was obtained
//!
//! One callback may carry several handlers; for any outcome at most the one
//! matching handler runs.

use std::sync::Arc;

use geomajas_core::CommandResponse;

use crate::transport::TransportError;

pub type ResponseHandler = Arc<dyn Fn(&CommandResponse) + Send + Sync>;
pub type TransportErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Legacy error-only callback, invoked on transport failure before the
/// communication-exception handlers.
pub type ErrorCallback = TransportErrorHandler;

#[derive(Clone, Default)]
pub struct CommandCallback {
    on_success: Option<ResponseHandler>,
    on_command_exception: Option<ResponseHandler>,
    on_communication_exception: Option<TransportErrorHandler>,
}

impl CommandCallback {
    pub fn success<F>(f: F) -> Self
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        Self::default().with_success(f)
    }

    pub fn command_exception<F>(f: F) -> Self
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        Self::default().with_command_exception(f)
    }

    pub fn communication_exception<F>(f: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        Self::default().with_communication_exception(f)
    }

    pub fn with_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn with_command_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        self.on_command_exception = Some(Arc::new(f));
        self
    }

    pub fn with_communication_exception<F>(mut self, f: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.on_communication_exception = Some(Arc::new(f));
        self
    }

    pub fn success_handler(&self) -> Option<&ResponseHandler> {
        self.on_success.as_ref()
    }

    pub fn command_exception_handler(&self) -> Option<&ResponseHandler> {
        self.on_command_exception.as_ref()
    }

    pub fn communication_exception_handler(&self) -> Option<&TransportErrorHandler> {
        self.on_communication_exception.as_ref()
    }

    pub fn handles_command_exceptions(&self) -> bool {
        self.on_command_exception.is_some()
    }

    pub fn handles_communication_exceptions(&self) -> bool {
        self.on_communication_exception.is_some()
    }
}

impl core::fmt::Debug for CommandCallback {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandCallback")
            .field("success", &self.on_success.is_some())
            .field("command_exception", &self.on_command_exception.is_some())
            .field(
                "communication_exception",
                &self.on_communication_exception.is_some(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_registers_each_capability_separately() {
        let cb = CommandCallback::success(|_| {}).with_command_exception(|_| {});
        assert!(cb.success_handler().is_some());
        assert!(cb.handles_command_exceptions());
        assert!(!cb.handles_communication_exceptions());

        let comm = CommandCallback::communication_exception(|_| {});
        assert!(comm.success_handler().is_none());
        assert!(comm.handles_communication_exceptions());
    }
}
