// auth-server/src/api/mod.rs
pub mod auth;
pub mod users;

use actix_web::{get, HttpResponse, Responder};
use serde_json::json;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "service": "Mini App Auth API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /api/auth/telegram",
            "POST /api/validate-user",
            "GET /api/get-user"
        ]
    }))
}

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(auth::telegram_auth)
            .service(users::validate_user)
            .service(users::get_user),
    );
}
