// common/src/messages.rs
//
// Wire types shared by the auth service and the session agent. Shapes
// follow the public API contract exactly; serde renames keep the Rust
// side idiomatic.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::Identity;

/// Body accepted by `POST /api/auth/telegram` in its JSON-object form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "initData")]
    pub init_data: String,
}

/// Successful authentication response. `profile` is null when the payload
/// verified but carried no `user` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub profile: Option<Identity>,
    pub is_admin: bool,
}

/// A telegram id as clients send it: a JSON number or a numeric string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelegramIdValue {
    Int(i64),
    Text(String),
}

impl TelegramIdValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TelegramIdValue::Int(n) => Some(*n),
            TelegramIdValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Body accepted by `POST /api/validate-user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub telegram_id: Option<TelegramIdValue>,
}

/// Successful validation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub ok: bool,
    pub user: UserSummary,
}

/// The slim profile returned by validation; enough for a client to refresh
/// its displayed identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Full stored profile returned by `GET /api/get-user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetails {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Successful user-lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDetailsResponse {
    pub ok: bool,
    pub user: UserDetails,
}

/// Machine-readable error discriminators. Only `UserDeleted` carries
/// logout semantics; clients must not react to its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserDeleted,
}

/// Error envelope shared by every endpoint: `ok` is always false, `error`
/// is human-readable, `code` is present only when a machine needs to act
/// on the distinction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            ok: false,
            error: error.into(),
            code: Some(code),
        }
    }
}
