//! Session renewal: login prompt de-duplication and command replay.
//!
//! When a command fails authentication, the dispatcher parks it in a retry
//! queue keyed by the token it was sent with (the *stale* token). The first
//! command parked under a given stale token triggers one call to the
//! configured [`TokenRequestHandler`]; later ones only join the queue. While the
//! queue exists, new commands stamped with that token skip the network and go
//! straight into the queue.
//!
//! When the handler reports a new token through its [`TokenNotifier`], the
//! dispatcher stores it, fires `TokenChanged`, and re-executes every parked
//! command with its original [`Deferred`].
//!
//! A handler that never answers leaves its queue parked indefinitely; there is
//! no timeout.

use std::sync::{Arc, Weak};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use geomajas_core::UserDetail;
use geomajas_events::DispatcherEvent;

use crate::deferred::Deferred;
use crate::dispatcher::{Dispatcher, Inner, PendingCommand, guarded};

/// Prefix of the placeholder key used by [`Dispatcher::login`].
const FORCED_LOGIN_PREFIX: &str = "forced-login:";

/// Obtains a fresh session token, typically by prompting the user.
///
/// `login` is called at most once per stale token. The handler must eventually
/// call [`TokenNotifier::token_changed`]; it may do so from any thread, later,
/// or immediately from within `login`.
pub trait TokenRequestHandler: Send + Sync {
    fn login(&self, notifier: TokenNotifier);
}

impl<F> TokenRequestHandler for F
where
    F: Fn(TokenNotifier) + Send + Sync,
{
    fn login(&self, notifier: TokenNotifier) {
        self(notifier)
    }
}

/// One-shot channel back to the dispatcher for a login request.
///
/// Consumed by [`token_changed`](Self::token_changed), so a login reports at
/// most once.
#[must_use = "the retry queue stays parked until token_changed is called"]
pub struct TokenNotifier {
    dispatcher: Weak<Inner>,
    stale_token: String,
}

impl TokenNotifier {
    /// The token being replaced (empty when the failing command had none).
    pub fn stale_token(&self) -> &str {
        &self.stale_token
    }

    /// True when this login was forced through [`Dispatcher::login`].
    pub fn is_forced(&self) -> bool {
        self.stale_token.starts_with(FORCED_LOGIN_PREFIX)
    }

    /// Report the new token and replay the commands parked under the stale one.
    pub fn token_changed(self, token: impl Into<String>, user_detail: UserDetail) {
        match self.dispatcher.upgrade() {
            Some(inner) => {
                Dispatcher { inner }.on_token_changed(&self.stale_token, token.into(), user_detail)
            }
            None => debug!("dispatcher dropped before login completed"),
        }
    }
}

impl core::fmt::Debug for TokenNotifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenNotifier")
            .field("forced", &self.is_forced())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Park `pending` under `stale_token`, asking `handler` for a token if this
    /// is the first entry for that key.
    pub(crate) fn handle_login(
        &self,
        handler: Arc<dyn TokenRequestHandler>,
        stale_token: String,
        pending: Option<PendingCommand>,
    ) {
        let handler = {
            let mut state = self.state();
            let first = !state.pending_by_stale_token.contains_key(&stale_token);
            if let Some(pending) = &pending {
                state.hold(&pending.deferred);
            }
            let queue = state
                .pending_by_stale_token
                .entry(stale_token.clone())
                .or_default();
            if let Some(pending) = pending {
                queue.push(pending);
            }
            first.then_some(handler)
        };

        match handler {
            Some(handler) => {
                info!("requesting a new session token");
                let notifier = TokenNotifier {
                    dispatcher: Arc::downgrade(&self.inner),
                    stale_token,
                };
                guarded("token request handler", || handler.login(notifier));
            }
            None => debug!("login already requested for this token, command parked"),
        }
    }

    /// Force a fresh login, even while a valid token is held.
    ///
    /// Uses a random placeholder key so the token-request handler is always
    /// called. Commands keep going out with the current token meanwhile.
    pub fn login(&self) {
        let Some(handler) = self.state().token_request_handler.clone() else {
            warn!("login requested but no token request handler is configured");
            return;
        };
        let placeholder = format!("{FORCED_LOGIN_PREFIX}{}", Uuid::new_v4().simple());
        self.handle_login(handler, placeholder, None);
    }

    /// Forget the current token and user, and fire `TokenChanged` with no token.
    pub fn logout(&self) {
        {
            let mut state = self.state();
            state.user_token = None;
            state.user_detail = UserDetail::default();
        }
        info!("session token cleared");
        self.publish(DispatcherEvent::TokenChanged {
            token: None,
            user_detail: UserDetail::default(),
        });
    }

    /// Install a token obtained outside the login flow (e.g. single sign-on).
    pub fn set_token(&self, token: Option<String>, user_detail: UserDetail) {
        let token = token.filter(|t| !t.is_empty());
        {
            let mut state = self.state();
            state.user_token = token.clone();
            state.user_detail = user_detail.clone();
        }
        self.publish(DispatcherEvent::TokenChanged { token, user_detail });
    }

    fn on_token_changed(&self, stale_token: &str, token: String, user_detail: UserDetail) {
        let token = (!token.is_empty()).then_some(token);
        let parked = {
            let mut state = self.state();
            state.user_token = token.clone();
            state.user_detail = user_detail.clone();
            let parked = state
                .pending_by_stale_token
                .remove(stale_token)
                .unwrap_or_default();
            for pending in &parked {
                state.release(pending.deferred.id());
            }
            parked
        };

        info!(replayed = parked.len(), "session token changed");
        self.publish(DispatcherEvent::TokenChanged { token, user_detail });

        for pending in parked {
            replay(self, pending);
        }
    }

    /// Commands parked under `stale_token`, with their deferreds.
    pub fn pending(&self, stale_token: &str) -> Vec<(String, Deferred)> {
        self.state()
            .pending_by_stale_token
            .get(stale_token)
            .map(|queue| {
                queue
                    .iter()
                    .map(|p| (p.command.name().to_string(), p.deferred.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn replay(dispatcher: &Dispatcher, pending: PendingCommand) {
    let PendingCommand {
        command,
        deferred,
        parked_at,
    } = pending;
    let parked_ms = (Utc::now() - parked_at).num_milliseconds();
    debug!(command = command.name(), parked_ms, "replaying parked command");
    // Replays are tracked through the in-flight count, not through the handle.
    let _ = dispatcher.execute(command, &deferred);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::transport::InMemoryTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use geomajas_events::EventBus;

    #[test]
    fn forced_login_always_calls_the_handler() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        dispatcher.set_token(Some("valid".into()), UserDetail::default());

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let notifiers = Arc::new(Mutex::new(Vec::new()));
        let kept = notifiers.clone();
        dispatcher.set_token_request_handler(move |notifier: TokenNotifier| {
            assert!(notifier.is_forced());
            seen.fetch_add(1, Ordering::SeqCst);
            kept.lock().unwrap().push(notifier);
        });

        dispatcher.login();
        dispatcher.login();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let first = notifiers.lock().unwrap().remove(0);
        first.token_changed("fresh", UserDetail::new("u1"));
        assert_eq!(dispatcher.user_token().as_deref(), Some("fresh"));
        assert_eq!(dispatcher.user_detail().user_id.as_deref(), Some("u1"));
        assert_eq!(dispatcher.stale_tokens().len(), 1);
    }

    #[test]
    fn logout_clears_session_and_announces_it() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        dispatcher.set_token(Some("t".into()), UserDetail::new("u").with_name("Ann"));
        let sub = dispatcher.events().subscribe();

        dispatcher.logout();

        assert_eq!(dispatcher.user_token(), None);
        assert!(dispatcher.user_detail().is_empty());
        assert_eq!(
            sub.drain(),
            vec![DispatcherEvent::TokenChanged {
                token: None,
                user_detail: UserDetail::default()
            }]
        );
    }

    #[test]
    fn notifier_outliving_dispatcher_is_harmless() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        let slot = Arc::new(Mutex::new(None));
        let keep = slot.clone();
        dispatcher.set_token_request_handler(move |n: TokenNotifier| {
            *keep.lock().unwrap() = Some(n);
        });
        dispatcher.login();
        drop(dispatcher);

        let notifier = slot.lock().unwrap().take().unwrap();
        notifier.token_changed("late", UserDetail::default());
    }

    #[test]
    fn parking_uses_the_handler_it_was_given() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handler: Arc<dyn TokenRequestHandler> = Arc::new(move |_n: TokenNotifier| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        // Cleared on another thread after the failure was classified.
        dispatcher.clear_token_request_handler();
        let deferred = Deferred::new();
        dispatcher.handle_login(
            handler,
            "stale".into(),
            Some(PendingCommand::new(
                geomajas_core::Command::new("c", serde_json::json!({})),
                &deferred,
            )),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.pending_count("stale"), 1);
        assert!(dispatcher.active_deferreds().iter().any(|d| d.same_as(&deferred)));
    }

    #[test]
    fn login_without_handler_is_a_no_op() {
        let dispatcher =
            Dispatcher::with_runtime(InMemoryTransport::always_ok(), DispatcherConfig::default(), None);
        dispatcher.login();
        assert!(dispatcher.stale_tokens().is_empty());
    }
}
