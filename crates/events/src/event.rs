use geomajas_core::UserDetail;

/// Lifecycle notifications emitted by the command dispatcher.
///
/// Events reach handlers in the order of the state changes that caused them:
/// - `DispatchStarted`: in-flight count went from 0 to 1
/// - `DispatchStopped`: in-flight count went back to 0
/// - `TokenChanged`: the session token was replaced or cleared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatcherEvent {
    DispatchStarted,
    DispatchStopped,
    TokenChanged {
        token: Option<String>,
        user_detail: UserDetail,
    },
}

impl DispatcherEvent {
    /// Stable event name, used as a log field.
    pub fn event_type(&self) -> &'static str {
        match self {
            DispatcherEvent::DispatchStarted => "dispatch.started",
            DispatcherEvent::DispatchStopped => "dispatch.stopped",
            DispatcherEvent::TokenChanged { .. } => "token.changed",
        }
    }

    /// True for the busy/idle transitions.
    pub fn is_dispatch_transition(&self) -> bool {
        matches!(
            self,
            DispatcherEvent::DispatchStarted | DispatcherEvent::DispatchStopped
        )
    }
}
