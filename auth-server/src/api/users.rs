// auth-server/src/api/users.rs
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::Deserialize;

use common::messages::{
    ApiErrorBody, ErrorCode, UserDetailsResponse, ValidateRequest, ValidateResponse,
};

use crate::storage::UserStore;

// Confirm a previously authenticated profile still exists
#[post("/validate-user")]
pub async fn validate_user(body: web::Bytes, store: web::Data<UserStore>) -> impl Responder {
    let telegram_id = serde_json::from_slice::<ValidateRequest>(&body)
        .ok()
        .and_then(|req| req.telegram_id)
        .and_then(|id| id.as_i64());

    let telegram_id = match telegram_id {
        Some(id) => id,
        None => {
            return HttpResponse::BadRequest().json(ApiErrorBody::new("telegram_id required"));
        }
    };

    match store.get_by_id(telegram_id).await {
        Ok(Some(row)) => HttpResponse::Ok().json(ValidateResponse {
            ok: true,
            user: row.summary(),
        }),
        Ok(None) => {
            // Confirmed absence, not an infrastructure failure: this is the
            // one case that tells clients to tear their session down.
            tracing::info!("Validation miss: user {} is no longer stored", telegram_id);
            HttpResponse::NotFound().json(ApiErrorBody::with_code(
                "User not found",
                ErrorCode::UserDeleted,
            ))
        }
        Err(e) => {
            tracing::error!("Validation lookup failed for {}: {}", telegram_id, e);
            HttpResponse::InternalServerError().json(ApiErrorBody::new("Validation failed"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetUserQuery {
    pub id: Option<String>,
}

// Look up a stored profile by telegram id or username
#[get("/get-user")]
pub async fn get_user(
    query: web::Query<GetUserQuery>,
    store: web::Data<UserStore>,
) -> impl Responder {
    let id = match query.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => return HttpResponse::BadRequest().json(ApiErrorBody::new("id required")),
    };

    // All-digit values are telegram ids, anything else is a username.
    let looked_up = if id.bytes().all(|b| b.is_ascii_digit()) {
        match id.parse::<i64>() {
            Ok(n) => store.get_by_id(n).await,
            Err(_) => store.get_by_username(id).await,
        }
    } else {
        store.get_by_username(id).await
    };

    match looked_up {
        Ok(Some(row)) => HttpResponse::Ok().json(UserDetailsResponse {
            ok: true,
            user: row.details(),
        }),
        Ok(None) => HttpResponse::NotFound().json(ApiErrorBody::new("User not found")),
        Err(e) => {
            tracing::error!("User lookup failed for {}: {}", id, e);
            HttpResponse::InternalServerError().json(ApiErrorBody::new("Lookup failed"))
        }
    }
}
