// session-agent/src/main.rs
use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;

use common::utils::setup_tracing;
use common::Config;
use session_agent::actors::session_actor::{Login, SessionActor, SessionEvent, Subscribe};
use session_agent::api_client::HttpValidationApi;
use session_agent::session_store::FileStore;

/// Minimal shell around the session actor: logs what happens and exits the
/// process when asked to navigate back to the entry screen.
struct ShellActor;

impl Actor for ShellActor {
    type Context = Context<Self>;
}

impl Handler<SessionEvent> for ShellActor {
    type Result = ();

    fn handle(&mut self, event: SessionEvent, _ctx: &mut Self::Context) -> Self::Result {
        match event {
            SessionEvent::StateChanged(state) => {
                tracing::info!("Session state: {:?}", state);
            }
            SessionEvent::SessionInvalidated { message } => {
                tracing::warn!("{}", message);
            }
            SessionEvent::RedirectToEntry => {
                tracing::info!("Returning to entry screen");
                System::current().stop();
            }
        }
    }
}

fn to_io_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix::main]
async fn main() -> io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    let reconcile = config.agent.reconcile.clone();
    let timeout = Duration::from_secs(reconcile.request_timeout_seconds);

    tracing::info!(
        "Starting session agent against {} (interval: {}s)",
        config.server.public_base_url,
        reconcile.interval_seconds
    );

    let store = Arc::new(FileStore::new(&config.agent.session_cache_path));
    let api = Arc::new(
        HttpValidationApi::new(config.server.public_base_url.clone(), timeout)
            .map_err(to_io_error)?,
    );

    let agent = SessionActor::new(store, api, reconcile).start();

    let shell = ShellActor.start();
    agent
        .send(Subscribe {
            recipient: shell.recipient(),
        })
        .await
        .map_err(to_io_error)?;

    // A payload handed over by the embedding shell, typically pasted from
    // the Telegram client during development.
    if let Ok(init_data) = std::env::var("TELEGRAM_INIT_DATA") {
        match agent.send(Login { init_data }).await {
            Ok(Ok(identity)) => tracing::info!("Logged in as telegram user {}", identity.id),
            Ok(Err(e)) => tracing::warn!("Login failed: {}", e),
            Err(e) => tracing::error!("Session agent unreachable: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down session agent");
    Ok(())
}
