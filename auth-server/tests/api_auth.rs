// Integration tests for the Telegram auth endpoint, driven through the
// real actix service in-process.
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use secrecy::SecretBox;

use auth_server::api;
use auth_server::storage::UserStore;
use common::config::AuthConfig;
use common::initdata::signed_init_data;
use common::messages::AuthResponse;
use common::utils::unix_timestamp;

const TOKEN: &str = "123456:INTEGRATION-test-token";

fn auth_config(token: &str) -> AuthConfig {
    AuthConfig {
        bot_token: SecretBox::new(Box::new(token.to_string())),
        admin_ids: vec![500],
        ..AuthConfig::default()
    }
}

fn ann_payload() -> String {
    signed_init_data(
        &[
            ("auth_date", &unix_timestamp().to_string()),
            ("query_id", "AAE1xZQAAAAAAQ"),
            (
                "user",
                r#"{"id":500,"first_name":"Ann","last_name":"Lee","username":"ann"}"#,
            ),
        ],
        TOKEN,
    )
}

macro_rules! spawn_app {
    ($store:expr, $token:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(auth_config($token)))
                .app_data(web::Data::new($store.clone()))
                .service(api::index)
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_auth_accepts_json_object_body() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": ann_payload() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: AuthResponse = test::read_body_json(resp).await;
    assert!(body.ok);
    assert!(body.is_admin);
    let profile = body.profile.unwrap();
    assert_eq!(profile.id, 500);
    assert_eq!(profile.first_name, "Ann");

    // The profile was persisted as part of the login.
    let row = store.get_by_id(500).await.unwrap().unwrap();
    assert_eq!(row.username, "ann");
}

#[actix_web::test]
async fn test_auth_accepts_json_string_and_raw_bodies() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);
    let payload = ann_payload();

    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!(payload))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_payload(payload)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_auth_without_user_field_returns_null_profile() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let payload = signed_init_data(
        &[("auth_date", &unix_timestamp().to_string()), ("q", "1")],
        TOKEN,
    );
    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": payload }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: AuthResponse = test::read_body_json(resp).await;
    assert!(body.ok);
    assert!(body.profile.is_none());
    assert!(!body.is_admin);
}

#[actix_web::test]
async fn test_auth_empty_body_is_bad_request() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    for body in ["", "{}"] {
        let req = test::TestRequest::post()
            .uri("/api/auth/telegram")
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"], "No initData provided");
    }
}

#[actix_web::test]
async fn test_auth_tampered_payload_is_unauthorized() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let tampered = ann_payload().replace("AAE1xZQAAAAAAQ", "AAE1xZQAAAAAAR");
    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": tampered }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "hash-mismatch");

    // Nothing got persisted along the way.
    assert!(store.get_by_id(500).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_auth_stale_payload_is_unauthorized() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let two_days_ago = (unix_timestamp() - 2 * 86_400).to_string();
    let payload = signed_init_data(&[("auth_date", &two_days_ago), ("q", "1")], TOKEN);
    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": payload }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "stale");
}

#[actix_web::test]
async fn test_auth_bad_user_json_is_bad_request() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let payload = signed_init_data(
        &[
            ("auth_date", &unix_timestamp().to_string()),
            ("user", "{broken"),
        ],
        TOKEN,
    );
    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": payload }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "Bad user payload in initData");
}

#[actix_web::test]
async fn test_auth_without_configured_token_is_server_error() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, "");

    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": ann_payload() }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "Server misconfigured");
}

#[actix_web::test]
async fn test_non_admin_user_is_not_admin() {
    let store = UserStore::open_in_memory().await.unwrap();
    let app = spawn_app!(store, TOKEN);

    let payload = signed_init_data(
        &[
            ("auth_date", &unix_timestamp().to_string()),
            ("user", r#"{"id":7,"first_name":"Bob"}"#),
        ],
        TOKEN,
    );
    let req = test::TestRequest::post()
        .uri("/api/auth/telegram")
        .set_json(serde_json::json!({ "initData": payload }))
        .to_request();
    let body: AuthResponse = test::call_and_read_body_json(&app, req).await;
    assert!(body.ok);
    assert!(!body.is_admin);
}
