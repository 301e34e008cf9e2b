// session-agent/tests/agent_flow.rs
//
// End-to-end: a real auth server over loopback HTTP, driven by the real
// agent. Covers the full session lifecycle from login through server-side
// deletion to the sticky logged-out state.
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use secrecy::SecretBox;

use auth_server::api;
use auth_server::storage::UserStore;
use common::config::{AuthConfig, ReconcileConfig};
use common::initdata::signed_init_data;
use common::utils::unix_timestamp;
use session_agent::actors::session_actor::{
    GetSessionState, Login, Logout, Reconcile, SessionActor, SessionState,
};
use session_agent::api_client::HttpValidationApi;
use session_agent::session_store::{MemoryStore, SessionStore};

const TOKEN: &str = "123456:E2E-test-token";

fn spawn_auth_server(store: UserStore) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    let auth_config = AuthConfig {
        bot_token: SecretBox::new(Box::new(TOKEN.to_string())),
        ..AuthConfig::default()
    };
    let auth_data = web::Data::new(auth_config);
    let store_data = web::Data::new(store);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(auth_data.clone())
            .app_data(store_data.clone())
            .service(api::index)
            .configure(api::configure)
    })
    .listen(listener)
    .unwrap()
    .workers(1)
    .run();
    actix_web::rt::spawn(server);

    base_url
}

fn eve_payload() -> String {
    let auth_date = unix_timestamp().to_string();
    signed_init_data(
        &[
            ("auth_date", auth_date.as_str()),
            ("query_id", "AAE2E"),
            (
                "user",
                r#"{"id":777,"first_name":"Eve","username":"eve_w"}"#,
            ),
        ],
        TOKEN,
    )
}

async fn settle() {
    actix_web::rt::time::sleep(Duration::from_millis(200)).await;
}

#[actix_web::test]
async fn test_full_session_lifecycle() {
    let users = UserStore::open_in_memory().await.unwrap();
    let base_url = spawn_auth_server(users.clone());

    let cache = Arc::new(MemoryStore::default());
    let config = ReconcileConfig {
        interval_seconds: 3600,
        logout_grace_seconds: 0,
        ..ReconcileConfig::default()
    };
    let api_client = Arc::new(HttpValidationApi::new(base_url, Duration::from_secs(5)).unwrap());
    let agent = SessionActor::new(cache.clone(), api_client, config).start();

    // Login verifies the payload server-side and persists the user there.
    let identity = agent
        .send(Login {
            init_data: eve_payload(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(identity.id, 777);
    assert_eq!(identity.username, "eve_w");
    assert!(users.get_by_id(777).await.unwrap().is_some());

    // A reconcile pass against the live server keeps the session.
    agent.send(Reconcile).await.unwrap();
    settle().await;
    assert!(matches!(
        agent.send(GetSessionState).await.unwrap(),
        SessionState::Authenticated(_)
    ));

    // Delete the account server-side; the next pass tears the session down.
    assert!(users.delete_user(777).await.unwrap());
    agent.send(Reconcile).await.unwrap();
    settle().await;

    assert_eq!(
        agent.send(GetSessionState).await.unwrap(),
        SessionState::LoggedOut
    );
    assert!(cache.load_profile().unwrap().is_none());
    assert!(cache.logged_out().unwrap());
}

#[actix_web::test]
async fn test_tampered_login_is_rejected() {
    let users = UserStore::open_in_memory().await.unwrap();
    let base_url = spawn_auth_server(users.clone());

    let cache = Arc::new(MemoryStore::default());
    let api_client = Arc::new(HttpValidationApi::new(base_url, Duration::from_secs(5)).unwrap());
    let agent = SessionActor::new(cache.clone(), api_client, ReconcileConfig::default()).start();

    let tampered = eve_payload().replace("777", "778");
    let result = agent.send(Login { init_data: tampered }).await.unwrap();
    assert!(result.is_err());

    assert_eq!(
        agent.send(GetSessionState).await.unwrap(),
        SessionState::Unauthenticated
    );
    assert!(cache.load_profile().unwrap().is_none());
    assert!(users.get_by_id(778).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_logout_survives_restart_against_live_server() {
    let users = UserStore::open_in_memory().await.unwrap();
    let base_url = spawn_auth_server(users.clone());

    let cache = Arc::new(MemoryStore::default());
    let config = ReconcileConfig {
        interval_seconds: 3600,
        logout_grace_seconds: 0,
        ..ReconcileConfig::default()
    };
    let api_client = Arc::new(
        HttpValidationApi::new(base_url.clone(), Duration::from_secs(5)).unwrap(),
    );

    let agent = SessionActor::new(cache.clone(), api_client, config.clone()).start();
    agent
        .send(Login {
            init_data: eve_payload(),
        })
        .await
        .unwrap()
        .unwrap();
    agent.send(Logout).await.unwrap();
    settle().await;

    // A second agent over the same cache starts logged out and never even
    // asks the server, although the account still exists there.
    let api_client = Arc::new(HttpValidationApi::new(base_url, Duration::from_secs(5)).unwrap());
    let restarted = SessionActor::new(cache.clone(), api_client, config).start();
    settle().await;

    assert_eq!(
        restarted.send(GetSessionState).await.unwrap(),
        SessionState::LoggedOut
    );
    assert!(users.get_by_id(777).await.unwrap().is_some());
}
