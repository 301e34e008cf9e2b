// auth-server/src/api/auth.rs
use actix_web::{post, web, HttpResponse, Responder};
use secrecy::ExposeSecret;

use common::config::AuthConfig;
use common::initdata::{extract_identity, validate_init_data, VerifyFailure};
use common::messages::{ApiErrorBody, AuthResponse};
use common::utils::unix_timestamp;

use crate::storage::UserStore;

/// Pull the raw init data out of any accepted body shape: a JSON object
/// `{"initData": "..."}`, a bare JSON string, or the raw text itself. A
/// JSON body without a usable `initData` yields the empty string, which
/// verification rejects as a missing payload.
fn init_data_from_body(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        return match value {
            serde_json::Value::String(raw) => raw,
            other => other
                .get("initData")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        };
    }
    String::from_utf8_lossy(body).into_owned()
}

// Verify a Telegram WebApp payload and upsert the profile
#[post("/auth/telegram")]
pub async fn telegram_auth(
    body: web::Bytes,
    auth: web::Data<AuthConfig>,
    store: web::Data<UserStore>,
) -> impl Responder {
    let raw = init_data_from_body(&body);

    let fields = match validate_init_data(
        &raw,
        auth.bot_token.expose_secret(),
        &auth.validate_options(),
    ) {
        Ok(fields) => fields,
        Err(VerifyFailure::MissingPayload) => {
            return HttpResponse::BadRequest().json(ApiErrorBody::new("No initData provided"));
        }
        Err(VerifyFailure::MissingSecret) => {
            tracing::error!("Rejecting auth request: bot token is not configured");
            return HttpResponse::InternalServerError()
                .json(ApiErrorBody::new("Server misconfigured"));
        }
        Err(failure) => {
            tracing::warn!("Rejected init data: {}", failure.reason());
            return HttpResponse::Unauthorized().json(ApiErrorBody::new(failure.reason()));
        }
    };

    let profile = match extract_identity(&fields) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Verified payload carried an unusable user field: {}", e);
            return HttpResponse::BadRequest()
                .json(ApiErrorBody::new("Bad user payload in initData"));
        }
    };

    let mut is_admin = false;
    if let Some(identity) = &profile {
        is_admin = auth.is_admin(identity.id);

        // Persistence is best-effort here: the payload already proved
        // itself, so a storage hiccup must not turn into an auth failure.
        if let Err(e) = store.upsert_profile(identity, unix_timestamp()).await {
            tracing::error!("Profile upsert failed for {}: {}", identity.id, e);
        } else {
            tracing::info!("Authenticated telegram user {}", identity.id);
        }
    }

    HttpResponse::Ok().json(AuthResponse {
        ok: true,
        profile,
        is_admin,
    })
}
