//! Asynchronous command dispatch with session/login retry.
//!
//! ## Flow
//!
//! ```text
//! execute(command, deferred)
//!   ↓
//! 1. Track deferred, stamp locale + user token
//!   ↓
//! 2. Token already known stale? ──yes──► queue under that token (no request)
//!   ↓ no
//! 3. in_flight += 1 (0 → 1 fires DispatchStarted), spawn the transport call
//!   ↓
//! 4. Route the outcome:
//!      transport error        → error callbacks, communication handlers, default
//!      error + auth failure   → login/retry (see `login`)
//!      error                  → command-exception handlers, default
//!      success                → success handlers, in registration order
//!   ↓
//! 5. in_flight -= 1 (→ 0 fires DispatchStopped), always, via a drop guard
//! ```
//!
//! ## Concurrency
//!
//! The dispatcher is a cheap-to-clone context object; clones share one state.
//! State sits behind a mutex that is never held across an `.await`, nor while
//! user callbacks, event handlers or the token-request handler run, so any of
//! those may call back into the dispatcher.
//!
//! Completions of different commands may interleave in any order. Callbacks of
//! one deferred always fire in registration order.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, warn};

use geomajas_core::{Command, CommandResponse, DeferredId, FeatureInclude, RequestId, UserDetail};
use geomajas_events::{DispatcherEvent, EventBus, HandlerRegistration, InMemoryEventBus};

use crate::callback::{ResponseHandler, TransportErrorHandler};
use crate::config::DispatcherConfig;
use crate::deferred::Deferred;
use crate::login::TokenRequestHandler;
use crate::presenter::{ErrorPresenter, LogErrorPresenter};
use crate::transport::{CommandTransport, HttpTransport, TransportError};

/// A command parked until a fresh token is available.
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub(crate) command: Command,
    pub(crate) deferred: Deferred,
    pub(crate) parked_at: DateTime<Utc>,
}

impl PendingCommand {
    pub(crate) fn new(command: Command, deferred: &Deferred) -> Self {
        Self {
            command,
            deferred: deferred.clone(),
            parked_at: Utc::now(),
        }
    }
}

/// A deferred the dispatcher currently holds, with the number of sends and
/// queue entries referring to it.
#[derive(Debug)]
struct ActiveDeferred {
    deferred: Deferred,
    holds: usize,
}

pub(crate) struct DispatcherState {
    pub(crate) config: DispatcherConfig,
    pub(crate) in_flight: usize,
    pub(crate) user_token: Option<String>,
    pub(crate) user_detail: UserDetail,
    pub(crate) pending_by_stale_token: HashMap<String, Vec<PendingCommand>>,
    pub(crate) token_request_handler: Option<Arc<dyn TokenRequestHandler>>,
    active: HashMap<DeferredId, ActiveDeferred>,
    command_exception_callback: Option<ResponseHandler>,
    communication_exception_callback: Option<TransportErrorHandler>,
    presenter: Arc<dyn ErrorPresenter>,
    /// Events waiting for delivery, in the order their state changes happened.
    outbox: VecDeque<DispatcherEvent>,
    /// Set while one thread is delivering the outbox.
    draining: bool,
}

impl DispatcherState {
    pub(crate) fn hold(&mut self, deferred: &Deferred) {
        self.active
            .entry(deferred.id())
            .or_insert_with(|| ActiveDeferred {
                deferred: deferred.clone(),
                holds: 0,
            })
            .holds += 1;
    }

    pub(crate) fn release(&mut self, id: DeferredId) {
        let drop_entry = match self.active.get_mut(&id) {
            Some(active) => {
                active.holds = active.holds.saturating_sub(1);
                active.holds == 0
            }
            None => false,
        };
        if drop_entry {
            self.active.remove(&id);
        }
    }
}

pub(crate) struct Inner {
    transport: Arc<dyn CommandTransport>,
    events: Arc<InMemoryEventBus<DispatcherEvent>>,
    state: Mutex<DispatcherState>,
    idle: Notify,
    runtime: Option<Handle>,
}

/// Result of handing a command to [`Dispatcher::execute`].
#[derive(Debug)]
pub enum Dispatch {
    /// The session token is known to be stale; the command waits for a new one.
    Queued,
    /// The request is in flight on the runtime.
    Sent(JoinHandle<()>),
    /// The request could not be started; the communication-exception path
    /// already ran.
    Failed,
}

impl Dispatch {
    pub fn is_queued(&self) -> bool {
        matches!(self, Dispatch::Queued)
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }

    /// Wait until the response for this send attempt has been routed.
    ///
    /// Returns immediately for queued or failed dispatches. Commands replayed
    /// after a login run as new send attempts; use
    /// [`Dispatcher::wait_idle`] to wait for those as well.
    pub async fn wait(self) {
        if let Dispatch::Sent(handle) = self {
            if let Err(err) = handle.await {
                error!("command task ended abnormally: {err}");
            }
        }
    }
}

/// Coordinates command sends, response routing and session renewal.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher on top of `transport`.
    ///
    /// Requests are spawned on the runtime current at call time, or on the one
    /// current when the dispatcher was created.
    pub fn new<T>(transport: T, config: DispatcherConfig) -> Self
    where
        T: CommandTransport + 'static,
    {
        Self::with_runtime(transport, config, Handle::try_current().ok())
    }

    pub fn with_runtime<T>(transport: T, config: DispatcherConfig, runtime: Option<Handle>) -> Self
    where
        T: CommandTransport + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                events: Arc::new(InMemoryEventBus::new()),
                state: Mutex::new(DispatcherState {
                    config,
                    in_flight: 0,
                    user_token: None,
                    user_detail: UserDetail::default(),
                    pending_by_stale_token: HashMap::new(),
                    token_request_handler: None,
                    active: HashMap::new(),
                    command_exception_callback: None,
                    communication_exception_callback: None,
                    presenter: Arc::new(LogErrorPresenter),
                    outbox: VecDeque::new(),
                    draining: false,
                }),
                idle: Notify::new(),
                runtime,
            }),
        }
    }

    /// Dispatcher talking JSON over HTTP to the configured service URL.
    pub fn http(config: DispatcherConfig) -> Self {
        let transport =
            HttpTransport::new(config.service_url()).with_timeout(config.request_timeout());
        Self::new(transport, config)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, DispatcherState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn runtime(&self) -> Option<Handle> {
        Handle::try_current()
            .ok()
            .or_else(|| self.inner.runtime.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────

    /// Send `command`, routing the outcome to the callbacks of `deferred`.
    ///
    /// Never fails: every error is routed to callbacks or to the default
    /// handlers. Returns as soon as the request is started (or queued).
    pub fn execute(&self, mut command: Command, deferred: &Deferred) -> Dispatch {
        {
            let mut state = self.state();
            let token = state.user_token.clone();
            let locale = state.config.locale().map(str::to_owned);
            command.stamp(token, locale);

            let stale_key = command
                .user_token()
                .filter(|t| !t.is_empty())
                .map(str::to_owned);
            if let Some(key) = stale_key {
                if state.pending_by_stale_token.contains_key(&key) {
                    debug!(
                        command = command.name(),
                        "token already stale, queueing until login completes"
                    );
                    state.hold(deferred);
                    state
                        .pending_by_stale_token
                        .entry(key)
                        .or_default()
                        .push(PendingCommand::new(command, deferred));
                    return Dispatch::Queued;
                }
            }

            state.hold(deferred);
            state.in_flight += 1;
            if state.in_flight == 1 {
                state.outbox.push_back(DispatcherEvent::DispatchStarted);
            }
        }
        self.deliver_events();

        let guard = InFlightGuard {
            dispatcher: self.clone(),
            deferred_id: deferred.id(),
        };

        let Some(runtime) = self.runtime() else {
            warn!(command = command.name(), "no async runtime, command not sent");
            self.on_communication_exception(&command, deferred, &TransportError::NoRuntime);
            drop(guard);
            return Dispatch::Failed;
        };

        let request_id = RequestId::new();
        let span = tracing::debug_span!("command", command = %command.name(), request_id = %request_id);
        let dispatcher = self.clone();
        let deferred = deferred.clone();
        let handle = runtime.spawn(
            async move {
                let _guard = guard;
                dispatcher.send(command, deferred).await;
            }
            .instrument(span),
        );

        Dispatch::Sent(handle)
    }

    async fn send(&self, command: Command, deferred: Deferred) {
        debug!("sending command");
        match self.inner.transport.execute(&command).await {
            Err(error) => self.on_communication_exception(&command, &deferred, &error),
            Ok(response) if response.is_error() => {
                self.on_command_error(command, &deferred, &response)
            }
            Ok(response) => self.on_success(&deferred, &response),
        }
    }

    fn on_success(&self, deferred: &Deferred, response: &CommandResponse) {
        debug!(elapsed_ms = response.execution_time_ms(), "command succeeded");
        for callback in deferred.callbacks() {
            if let Some(on_success) = callback.success_handler() {
                guarded("success", || on_success(response));
            }
        }
    }

    fn on_command_error(&self, command: Command, deferred: &Deferred, response: &CommandResponse) {
        let login_handler = self.state().token_request_handler.clone();
        let needs_login = response.has_authentication_failure() || !command.has_token();
        if let Some(handler) = login_handler.filter(|_| needs_login) {
            debug!(
                command = command.name(),
                "authentication required, parking command for retry"
            );
            let stale_token = command.user_token().unwrap_or_default().to_string();
            self.handle_login(
                handler,
                stale_token,
                Some(PendingCommand::new(command, deferred)),
            );
            return;
        }

        let mut handled = false;
        for callback in deferred.callbacks() {
            if let Some(on_exception) = callback.command_exception_handler() {
                handled = true;
                guarded("command exception", || on_exception(response));
            }
        }
        if !handled {
            self.default_command_exception(command.name(), response);
        }
    }

    fn on_communication_exception(
        &self,
        command: &Command,
        deferred: &Deferred,
        error: &TransportError,
    ) {
        if deferred.is_log_communication_exceptions() {
            warn!(command = command.name(), "communication exception: {error}");
        }

        for on_error in deferred.error_callbacks() {
            guarded("error", || on_error(error));
        }

        let mut handled = false;
        for callback in deferred.callbacks() {
            if let Some(on_exception) = callback.communication_exception_handler() {
                handled = true;
                guarded("communication exception", || on_exception(error));
            }
        }
        if !handled {
            self.default_communication_exception(command.name(), error);
        }
    }

    fn default_command_exception(&self, command_name: &str, response: &CommandResponse) {
        let (callback, show_error, presenter) = {
            let state = self.state();
            (
                state.command_exception_callback.clone(),
                state.config.show_error(),
                state.presenter.clone(),
            )
        };
        match callback {
            Some(callback) => guarded("default command exception", || callback(response)),
            None if show_error => guarded("error presenter", || {
                presenter.show_command_error(command_name, response)
            }),
            None => debug!(command = command_name, "unhandled command exception"),
        }
    }

    fn default_communication_exception(&self, command_name: &str, error: &TransportError) {
        let (callback, show_error, presenter) = {
            let state = self.state();
            (
                state.communication_exception_callback.clone(),
                state.config.show_error(),
                state.presenter.clone(),
            )
        };
        match callback {
            Some(callback) => guarded("default communication exception", || callback(error)),
            None if show_error => guarded("error presenter", || {
                presenter.show_communication_error(command_name, error)
            }),
            None => debug!(command = command_name, "unhandled communication exception"),
        }
    }

    fn finish(&self, deferred_id: DeferredId) {
        let stopped = {
            let mut state = self.state();
            state.release(deferred_id);
            debug_assert!(state.in_flight > 0, "in-flight count underflow");
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 {
                state.outbox.push_back(DispatcherEvent::DispatchStopped);
            }
            state.in_flight == 0
        };
        self.deliver_events();
        if stopped {
            self.inner.idle.notify_waiters();
        }
    }

    pub(crate) fn publish(&self, event: DispatcherEvent) {
        self.state().outbox.push_back(event);
        self.deliver_events();
    }

    /// Deliver queued events in order, outside the state lock.
    ///
    /// Only one thread delivers at a time; an event queued meanwhile (from
    /// another thread or from a handler) is delivered by the thread already
    /// draining, after the events queued before it.
    fn deliver_events(&self) {
        {
            let mut state = self.state();
            if state.draining || state.outbox.is_empty() {
                return;
            }
            state.draining = true;
        }
        loop {
            let next = {
                let mut state = self.state();
                match state.outbox.pop_front() {
                    Some(event) => event,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, event: DispatcherEvent) {
        let kind = event.event_type();
        if event.is_dispatch_transition() {
            debug!(event = kind, "busy state changed");
        }
        let events = self.inner.events.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| events.publish(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(event = kind, "failed to publish dispatcher event: {err}"),
            Err(_) => error!(event = kind, "dispatcher event handler panicked"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────

    pub fn in_flight(&self) -> usize {
        self.state().in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    /// Wait until no request is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn user_token(&self) -> Option<String> {
        self.state().user_token.clone()
    }

    pub fn user_detail(&self) -> UserDetail {
        self.state().user_detail.clone()
    }

    /// Number of commands waiting for a token to replace `stale_token`.
    pub fn pending_count(&self, stale_token: &str) -> usize {
        self.state()
            .pending_by_stale_token
            .get(stale_token)
            .map_or(0, Vec::len)
    }

    /// Stale tokens that currently have a retry queue.
    pub fn stale_tokens(&self) -> Vec<String> {
        self.state().pending_by_stale_token.keys().cloned().collect()
    }

    /// Deferreds that are in flight or waiting for a retry.
    pub fn active_deferreds(&self) -> Vec<Deferred> {
        self.state()
            .active
            .values()
            .map(|a| a.deferred.clone())
            .collect()
    }

    /// Cancel every tracked deferred so no late callback fires.
    ///
    /// Meant for application shutdown. Requests already on the wire still
    /// complete; only their callbacks are suppressed.
    pub fn cancel_all(&self) {
        let deferreds = self.active_deferreds();
        debug!(count = deferreds.len(), "cancelling all tracked deferreds");
        for deferred in deferreds {
            deferred.cancel();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Snapshot of the current configuration.
    pub fn config(&self) -> DispatcherConfig {
        self.state().config.clone()
    }

    pub fn show_error(&self) -> bool {
        self.state().config.show_error()
    }

    pub fn set_show_error(&self, show_error: bool) {
        self.state().config.set_show_error(show_error);
    }

    pub fn locale(&self) -> Option<String> {
        self.state().config.locale().map(str::to_owned)
    }

    pub fn set_locale(&self, locale: Option<String>) {
        self.state().config.set_locale(locale);
    }

    pub fn use_lazy_loading(&self) -> bool {
        self.state().config.use_lazy_loading()
    }

    pub fn set_use_lazy_loading(&self, use_lazy_loading: bool) {
        self.state().config.set_use_lazy_loading(use_lazy_loading);
    }

    pub fn lazy_feature_includes_default(&self) -> FeatureInclude {
        self.state().config.lazy_feature_includes_default()
    }

    pub fn lazy_feature_includes_select(&self) -> FeatureInclude {
        self.state().config.lazy_feature_includes_select()
    }

    pub fn lazy_feature_includes_all(&self) -> FeatureInclude {
        self.state().config.lazy_feature_includes_all()
    }

    /// Also switches lazy loading off.
    pub fn set_lazy_feature_includes_default(&self, include: FeatureInclude) {
        self.state().config.set_lazy_feature_includes_default(include);
    }

    /// Also switches lazy loading off.
    pub fn set_lazy_feature_includes_select(&self, include: FeatureInclude) {
        self.state().config.set_lazy_feature_includes_select(include);
    }

    /// Also switches lazy loading off.
    pub fn set_lazy_feature_includes_all(&self, include: FeatureInclude) {
        self.state().config.set_lazy_feature_includes_all(include);
    }

    /// Handler asked for a new token when a command fails authentication.
    /// Without one, authentication failures are plain command exceptions.
    pub fn set_token_request_handler<H>(&self, handler: H)
    where
        H: TokenRequestHandler + 'static,
    {
        self.state().token_request_handler = Some(Arc::new(handler));
    }

    pub fn clear_token_request_handler(&self) {
        self.state().token_request_handler = None;
    }

    /// Application-wide handler for command exceptions no callback claimed.
    /// Replaces the default error presentation.
    pub fn set_command_exception_callback<F>(&self, f: F)
    where
        F: Fn(&CommandResponse) + Send + Sync + 'static,
    {
        self.state().command_exception_callback = Some(Arc::new(f));
    }

    /// Application-wide handler for communication exceptions no callback
    /// claimed. Replaces the default error presentation.
    pub fn set_communication_exception_callback<F>(&self, f: F)
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.state().communication_exception_callback = Some(Arc::new(f));
    }

    pub fn set_error_presenter<P>(&self, presenter: P)
    where
        P: ErrorPresenter + 'static,
    {
        self.state().presenter = Arc::new(presenter);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────

    pub fn events(&self) -> &Arc<InMemoryEventBus<DispatcherEvent>> {
        &self.inner.events
    }

    pub fn add_dispatch_started_handler<F>(&self, f: F) -> HandlerRegistration
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.add_handler(Arc::new(move |event: &DispatcherEvent| {
            if matches!(event, DispatcherEvent::DispatchStarted) {
                f();
            }
        }))
    }

    pub fn add_dispatch_stopped_handler<F>(&self, f: F) -> HandlerRegistration
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.events.add_handler(Arc::new(move |event: &DispatcherEvent| {
            if matches!(event, DispatcherEvent::DispatchStopped) {
                f();
            }
        }))
    }

    pub fn add_token_changed_handler<F>(&self, f: F) -> HandlerRegistration
    where
        F: Fn(Option<&str>, &UserDetail) + Send + Sync + 'static,
    {
        self.inner.events.add_handler(Arc::new(move |event: &DispatcherEvent| {
            if let DispatcherEvent::TokenChanged { token, user_detail } = event {
                f(token.as_deref(), user_detail);
            }
        }))
    }

    pub fn remove_handler(&self, registration: HandlerRegistration) -> bool {
        self.inner.events.remove_handler(registration)
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state();
        f.debug_struct("Dispatcher")
            .field("in_flight", &state.in_flight)
            .field("has_token", &state.user_token.is_some())
            .field("stale_tokens", &state.pending_by_stale_token.len())
            .finish_non_exhaustive()
    }
}

/// Decrements the in-flight count when a send attempt ends, however it ends.
struct InFlightGuard {
    dispatcher: Dispatcher,
    deferred_id: DeferredId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.dispatcher.finish(self.deferred_id);
    }
}

/// Run user code, logging instead of propagating a panic.
pub(crate) fn guarded<F: FnOnce()>(what: &'static str, f: F) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(callback = what, "callback failed: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::CommandCallback;
    use crate::transport::InMemoryTransport;
    use geomajas_core::{ExceptionCode, ExceptionDto};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[tokio::test]
    async fn stamps_token_and_locale() {
        let transport = Arc::new(InMemoryTransport::always_ok());
        let dispatcher = Dispatcher::new(transport.clone(), DispatcherConfig::default());
        dispatcher.set_locale(Some("fr".to_string()));
        dispatcher.set_token(Some("abc".to_string()), UserDetail::default());

        dispatcher
            .execute(Command::new("c", json!({})), &Deferred::new())
            .wait()
            .await;

        let sent = transport.received();
        assert_eq!(sent[0].user_token(), Some("abc"));
        assert_eq!(sent[0].locale(), Some("fr"));
    }

    #[tokio::test]
    async fn panicking_callback_does_not_break_bookkeeping() {
        let dispatcher = Dispatcher::new(InMemoryTransport::always_ok(), DispatcherConfig::default());
        let (seen, probe) = counter();

        let deferred = Deferred::new();
        deferred.add_callback(CommandCallback::success(|_| panic!("boom")));
        deferred.add_callback(CommandCallback::success(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        dispatcher.execute(Command::new("c", json!({})), &deferred).wait().await;

        assert_eq!(probe.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.in_flight(), 0);
        assert!(dispatcher.active_deferreds().is_empty());
    }

    #[tokio::test]
    async fn unclaimed_command_exception_goes_to_default_callback() {
        let transport = InMemoryTransport::new(|_| {
            Ok(CommandResponse::failure(vec![ExceptionDto::new(
                "org.geomajas.global.GeomajasException",
                ExceptionCode(5),
            )]))
        });
        let dispatcher = Dispatcher::new(transport, DispatcherConfig::default());
        let (seen, probe) = counter();
        dispatcher.set_command_exception_callback(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let deferred = Deferred::with_callback(CommandCallback::success(|_| {
            panic!("success must not fire on error")
        }));
        dispatcher.execute(Command::new("c", json!({})), &deferred).wait().await;

        assert_eq!(probe.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn claimed_communication_exception_skips_default() {
        let transport = InMemoryTransport::new(|_| Err(TransportError::Network("down".into())));
        let dispatcher = Dispatcher::new(transport, DispatcherConfig::default());
        let (default_seen, default_probe) = counter();
        dispatcher.set_communication_exception_callback(move |_| {
            default_seen.fetch_add(1, Ordering::SeqCst);
        });

        let (legacy_seen, legacy_probe) = counter();
        let (claimed_seen, claimed_probe) = counter();
        let deferred = Deferred::with_callback(CommandCallback::communication_exception(
            move |err| {
                assert_eq!(err, &TransportError::Network("down".into()));
                claimed_seen.fetch_add(1, Ordering::SeqCst);
            },
        ));
        deferred.add_error_callback(move |_| {
            legacy_seen.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.execute(Command::new("c", json!({})), &deferred).wait().await;

        assert_eq!(legacy_probe.load(Ordering::SeqCst), 1);
        assert_eq!(claimed_probe.load(Ordering::SeqCst), 1);
        assert_eq!(default_probe.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn without_runtime_the_command_fails_through_callbacks() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        let (seen, probe) = counter();
        let deferred = Deferred::with_callback(CommandCallback::communication_exception(
            move |err| {
                assert_eq!(err, &TransportError::NoRuntime);
                seen.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let dispatch = dispatcher.execute(Command::new("c", json!({})), &deferred);

        assert!(matches!(dispatch, Dispatch::Failed));
        assert_eq!(probe.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn guarded_swallows_panics() {
        guarded("test", || panic!("nope"));
        guarded("test", || std::panic::panic_any(42_u8));
    }
}
