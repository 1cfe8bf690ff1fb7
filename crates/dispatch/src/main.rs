//! Send one command to a command service and print the response payload.
//!
//! ```text
//! geomajas-dispatch <commandName> [json-request]
//! ```
//!
//! Configuration comes from `GEOMAJAS_*` environment variables; a session token
//! can be supplied with `GEOMAJAS_USER_TOKEN`.

use std::io::IsTerminal;
use std::sync::Mutex;

use anyhow::{Context, bail};
use geomajas_core::{Command, UserDetail};
use geomajas_dispatch::{CommandCallback, Deferred, Dispatcher, DispatcherConfig, presenter};
use serde_json::Value;
use tokio::sync::oneshot;

const USAGE: &str = "usage: geomajas-dispatch <commandName> [json-request]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::io::stderr().is_terminal() {
        geomajas_observability::init_pretty();
    } else {
        geomajas_observability::init();
    }

    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        bail!(USAGE);
    };
    let request: Value = match args.next() {
        Some(raw) => serde_json::from_str(&raw).context("request must be valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let config = DispatcherConfig::from_env().context("invalid GEOMAJAS_* configuration")?;
    tracing::info!(service = config.service_url(), command = %name, "sending command");

    let dispatcher = Dispatcher::http(config);
    if let Ok(token) = std::env::var("GEOMAJAS_USER_TOKEN") {
        dispatcher.set_token(Some(token), UserDetail::default());
    }
    // Errors are reported through the outcome channel below.
    dispatcher.set_show_error(false);

    let (tx, rx) = oneshot::channel::<Result<Value, String>>();
    let tx = std::sync::Arc::new(Mutex::new(Some(tx)));
    let reply = move |outcome: Result<Value, String>| {
        if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(outcome);
        }
    };

    let on_success = reply.clone();
    let on_command_error = reply.clone();
    let on_transport_error = reply;
    let deferred = Deferred::with_callback(
        CommandCallback::success(move |response| on_success(Ok(response.payload().clone())))
            .with_command_exception(move |response| {
                on_command_error(Err(presenter::user_message(response)))
            })
            .with_communication_exception(move |error| on_transport_error(Err(error.to_string()))),
    );

    dispatcher.execute(Command::new(name, request), &deferred);

    match rx.await.context("dispatcher finished without an outcome")? {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(message) => bail!("command failed: {message}"),
    }
}
