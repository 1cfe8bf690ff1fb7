//! Default, user-facing error reporting.
//!
//! When no callback claims an error and no application-wide exception callback
//! is configured, the dispatcher hands the error to an [`ErrorPresenter`]
//! (only if `show_error` is enabled).

use geomajas_core::CommandResponse;

use crate::transport::TransportError;

pub trait ErrorPresenter: Send + Sync {
    fn show_command_error(&self, command_name: &str, response: &CommandResponse);

    fn show_communication_error(&self, command_name: &str, error: &TransportError);
}

/// Presenter that reports errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorPresenter;

impl ErrorPresenter for LogErrorPresenter {
    fn show_command_error(&self, command_name: &str, response: &CommandResponse) {
        let message = user_message(response);
        tracing::error!(
            command = command_name,
            exceptions = response.exceptions().len(),
            "command failed: {message}"
        );
    }

    fn show_communication_error(&self, command_name: &str, error: &TransportError) {
        tracing::error!(command = command_name, "could not reach the command service: {error}");
    }
}

/// Message shown to the user for a failed command.
///
/// Prefers the server's error messages, then the exception messages, then the
/// exception class names.
pub fn user_message(response: &CommandResponse) -> String {
    if !response.error_messages().is_empty() {
        return response.error_messages().join("; ");
    }
    let parts: Vec<&str> = response
        .exceptions()
        .iter()
        .map(|e| e.message.as_deref().unwrap_or(e.class_name.as_str()))
        .collect();
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join("; ")
    }
}
