//! Busy/idle bookkeeping under arbitrary send/complete interleavings.

use std::sync::Arc;

use async_trait::async_trait;
use geomajas_core::{Command, CommandResponse};
use geomajas_dispatch::{CommandTransport, Deferred, Dispatcher, DispatcherConfig, TransportError};
use geomajas_events::{DispatcherEvent, EventBus};
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::Semaphore;

/// Every request waits for one permit; releasing a permit completes one request.
struct PermitTransport {
    permits: Arc<Semaphore>,
    fail: bool,
}

#[async_trait]
impl CommandTransport for PermitTransport {
    async fn execute(&self, _command: &Command) -> Result<CommandResponse, TransportError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        permit.forget();
        if self.fail {
            Err(TransportError::Network("scripted".into()))
        } else {
            Ok(CommandResponse::default())
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Send,
    Complete,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Send), Just(Op::Complete)]
}

async fn settle(dispatcher: &Dispatcher, expected: usize) {
    for _ in 0..1000 {
        if dispatcher.in_flight() == expected {
            return;
        }
        tokio::task::yield_now().await;
    }
}

proptest! {
    #[test]
    fn busy_events_track_transitions_exactly(ops in prop::collection::vec(op(), 1..40), fail in any::<bool>()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let permits = Arc::new(Semaphore::new(0));
            let dispatcher = Dispatcher::new(
                PermitTransport { permits: permits.clone(), fail },
                DispatcherConfig::default(),
            );
            dispatcher.set_show_error(false);
            let sub = dispatcher.events().subscribe();

            let mut expected = 0usize;
            let mut transitions_up = 0usize;
            let mut transitions_down = 0usize;

            for op in ops {
                match op {
                    Op::Send => {
                        let _ = dispatcher.execute(Command::new("c", json!({})), &Deferred::new());
                        if expected == 0 {
                            transitions_up += 1;
                        }
                        expected += 1;
                    }
                    Op::Complete if expected > 0 => {
                        permits.add_permits(1);
                        expected -= 1;
                        if expected == 0 {
                            transitions_down += 1;
                        }
                    }
                    Op::Complete => {}
                }
                settle(&dispatcher, expected).await;
                prop_assert_eq!(dispatcher.in_flight(), expected);
                prop_assert_eq!(dispatcher.is_busy(), expected > 0);
            }

            permits.add_permits(expected);
            if expected > 0 {
                transitions_down += 1;
            }
            dispatcher.wait_idle().await;

            let events = sub.drain();
            let started = events.iter().filter(|e| **e == DispatcherEvent::DispatchStarted).count();
            let stopped = events.iter().filter(|e| **e == DispatcherEvent::DispatchStopped).count();
            prop_assert_eq!(started, transitions_up);
            prop_assert_eq!(stopped, transitions_down);

            // Strict alternation, starting with DispatchStarted.
            for (i, event) in events.iter().enumerate() {
                let want = if i % 2 == 0 {
                    DispatcherEvent::DispatchStarted
                } else {
                    DispatcherEvent::DispatchStopped
                };
                prop_assert_eq!(event, &want);
            }
            Ok(())
        })?;
    }
}
