// session-agent/src/actors/session_actor.rs
//
// Actor owning the client session. It polls the auth service on an
// interval, keeps the persisted cache in step with what the server says,
// and enforces the sticky logged-out marker so a torn-down session stays
// down across restarts.
use std::sync::Arc;
use std::time::Duration;

use actix::prelude::*;
use thiserror::Error;

use common::config::ReconcileConfig;
use common::models::identity::Identity;

use crate::api_client::{ApiError, ValidationApi};
use crate::session_store::SessionStore;

/// Shown to the user when the server confirms the account is gone.
pub const PROFILE_REMOVED_MESSAGE: &str = "Your profile was removed. Please log in again.";

/// Client-side session state. All transitions happen on the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session; a cached profile may still be waiting for validation.
    Unauthenticated,
    /// Server-confirmed session for this identity.
    Authenticated(Identity),
    /// Terminal until an explicit login clears it.
    LoggedOut,
}

/// Actor message: run one reconcile pass now
#[derive(Message)]
#[rtype(result = "()")]
pub struct Reconcile;

/// Actor message: authenticate with a fresh init-data payload
#[derive(Message)]
#[rtype(result = "Result<Identity, LoginError>")]
pub struct Login {
    pub init_data: String,
}

/// Actor message: user-initiated logout
#[derive(Message)]
#[rtype(result = "()")]
pub struct Logout;

/// Actor message: snapshot the current session state
#[derive(Message)]
#[rtype(result = "SessionState")]
pub struct GetSessionState;

/// Actor message: register a recipient for session events
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub recipient: Recipient<SessionEvent>,
}

/// Events pushed to subscribers (the embedding shell, tests).
#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A forced logout, carrying the user-facing explanation.
    SessionInvalidated { message: String },
    /// The shell should navigate back to the entry screen.
    RedirectToEntry,
}

#[derive(Debug, Error)]
pub enum LoginError {
    /// The server verified the payload but returned no profile to adopt.
    #[error("authentication succeeded but returned no profile")]
    NoProfile,

    /// A competing login or logout happened while this one was in flight.
    #[error("login superseded by a newer session change")]
    Superseded,

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct SessionActor {
    store: Arc<dyn SessionStore>,
    api: Arc<dyn ValidationApi>,
    config: ReconcileConfig,
    state: SessionState,
    /// Bumped on every login and logout; in-flight responses issued under
    /// an older generation are dropped when they land. Adopting a login
    /// result bumps again so validations of the replaced account go stale.
    generation: u64,
    in_flight: bool,
    subscribers: Vec<Recipient<SessionEvent>>,
}

impl SessionActor {
    pub fn new(
        store: Arc<dyn SessionStore>,
        api: Arc<dyn ValidationApi>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            api,
            config,
            state: SessionState::Unauthenticated,
            generation: 0,
            in_flight: false,
            subscribers: Vec::new(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        for subscriber in &self.subscribers {
            subscriber.do_send(event.clone());
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged(self.state.clone()));
        }
    }

    /// Clear the cached profile and set the sticky marker. Store failures
    /// are logged and ignored; the in-memory state stays authoritative.
    fn purge_session(&mut self) {
        if let Err(e) = self.store.clear_profile() {
            tracing::warn!("Failed to clear cached profile: {}", e);
        }
        if let Err(e) = self.store.set_logged_out() {
            tracing::warn!("Failed to persist logged-out marker: {}", e);
        }
    }

    /// Tear the session down after the server confirmed the account is
    /// gone: purge the cache, announce why, and schedule the redirect
    /// after the grace delay so the shell can show the message first.
    fn force_logout(&mut self, ctx: &mut Context<Self>) {
        if self.state == SessionState::LoggedOut {
            return;
        }

        self.purge_session();
        self.generation += 1;
        self.set_state(SessionState::LoggedOut);
        self.emit(SessionEvent::SessionInvalidated {
            message: PROFILE_REMOVED_MESSAGE.to_string(),
        });

        let grace = Duration::from_secs(self.config.logout_grace_seconds);
        ctx.run_later(grace, |act, _ctx| {
            act.emit(SessionEvent::RedirectToEntry);
        });
    }

    /// The identity a reconcile pass should check, if any. When
    /// unauthenticated, the cache may still hold a profile from a previous
    /// run that wants re-validation.
    fn reconcile_target(&self) -> Option<Identity> {
        match &self.state {
            SessionState::LoggedOut => None,
            SessionState::Authenticated(identity) => Some(identity.clone()),
            SessionState::Unauthenticated => match self.store.load_profile() {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!("Failed to read cached profile: {}", e);
                    None
                }
            },
        }
    }
}

impl Actor for SessionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        // The sticky marker wins over any cached profile at startup; only
        // an explicit login clears it.
        match self.store.logged_out() {
            Ok(true) => {
                self.state = SessionState::LoggedOut;
                tracing::info!("Session agent started logged out");
            }
            Ok(false) => {
                tracing::info!("Session agent started");
                ctx.notify(Reconcile);
            }
            Err(e) => {
                tracing::warn!("Failed to read logged-out marker: {}", e);
                ctx.notify(Reconcile);
            }
        }

        let interval = Duration::from_secs(self.config.interval_seconds);
        ctx.run_interval(interval, |_act, ctx| {
            ctx.notify(Reconcile);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Session agent stopped");
    }
}

// Handle a reconcile pass: confirm the server still knows this user
impl Handler<Reconcile> for SessionActor {
    type Result = ();

    fn handle(&mut self, _msg: Reconcile, ctx: &mut Self::Context) -> Self::Result {
        if self.state == SessionState::LoggedOut {
            // Repeating the logout decision is a no-op.
            return;
        }
        if self.in_flight && self.config.skip_overlapping_runs {
            tracing::debug!("Reconcile already in flight, skipping this pass");
            return;
        }

        let target = match self.reconcile_target() {
            Some(identity) => identity,
            None => return,
        };

        self.in_flight = true;
        let issued_in = self.generation;
        let api = Arc::clone(&self.api);
        let target_id = target.id;

        let fut = async move { api.validate(target_id).await }
            .into_actor(self)
            .map(move |result, act, ctx| {
                act.in_flight = false;

                // A response that raced a logout or a fresh login is stale;
                // dropping it here is what keeps dead sessions dead.
                if act.generation != issued_in {
                    tracing::debug!("Dropping stale validation response");
                    return;
                }

                match result {
                    Ok(summary) => {
                        let mut identity = target;
                        identity.username = summary.username;
                        identity.first_name = summary.first_name;
                        identity.last_name = summary.last_name;

                        if let Err(e) = act.store.save_profile(&identity) {
                            tracing::warn!("Failed to persist refreshed profile: {}", e);
                        }
                        act.set_state(SessionState::Authenticated(identity));
                    }
                    Err(ApiError::UserDeleted) => {
                        tracing::warn!("Server confirmed user {} is gone, logging out", target.id);
                        act.force_logout(ctx);
                    }
                    Err(e) => {
                        // Transient by definition: keep the session.
                        tracing::warn!("Reconcile pass failed, keeping session: {}", e);
                    }
                }
            });

        ctx.spawn(fut);
    }
}

// Handle an explicit login with a fresh payload
impl Handler<Login> for SessionActor {
    type Result = ResponseActFuture<Self, Result<Identity, LoginError>>;

    fn handle(&mut self, msg: Login, _ctx: &mut Self::Context) -> Self::Result {
        // A fresh login overrides stickiness before anything async runs.
        if let Err(e) = self.store.clear_logged_out() {
            tracing::warn!("Failed to clear logged-out marker: {}", e);
        }
        if self.state == SessionState::LoggedOut {
            self.set_state(SessionState::Unauthenticated);
        }
        self.generation += 1;
        let issued_in = self.generation;
        let api = Arc::clone(&self.api);

        Box::pin(
            async move { api.authenticate(&msg.init_data).await }
                .into_actor(self)
                .map(move |result, act, _ctx| {
                    if act.generation != issued_in {
                        return Err(LoginError::Superseded);
                    }

                    let response = result?;
                    let identity = response.profile.ok_or(LoginError::NoProfile)?;

                    // A reconcile issued while this login was in flight
                    // targets the account being replaced; bump again so its
                    // response lands stale.
                    act.generation += 1;

                    if let Err(e) = act.store.save_profile(&identity) {
                        tracing::warn!("Failed to persist profile after login: {}", e);
                    }
                    tracing::info!(
                        "Logged in as telegram user {} (admin: {})",
                        identity.id,
                        response.is_admin
                    );
                    act.set_state(SessionState::Authenticated(identity.clone()));
                    Ok(identity)
                }),
        )
    }
}

// Handle a user-initiated logout
impl Handler<Logout> for SessionActor {
    type Result = ();

    fn handle(&mut self, _msg: Logout, _ctx: &mut Self::Context) -> Self::Result {
        if self.state == SessionState::LoggedOut {
            return;
        }

        tracing::info!("User requested logout");
        self.purge_session();
        self.generation += 1;
        self.set_state(SessionState::LoggedOut);
        // An explicit logout redirects immediately, without a message.
        self.emit(SessionEvent::RedirectToEntry);
    }
}

// Handle session state queries
impl Handler<GetSessionState> for SessionActor {
    type Result = MessageResult<GetSessionState>;

    fn handle(&mut self, _msg: GetSessionState, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.clone())
    }
}

// Handle event subscriptions
impl Handler<Subscribe> for SessionActor {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        self.subscribers.push(msg.recipient);
    }
}
