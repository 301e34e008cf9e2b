// session-agent/src/api_client.rs
//
// HTTP client half of the auth contract. The error mapping here is what
// the reconciler's logout decision rests on: only a 404 whose body names
// USER_DELETED counts as confirmed absence, everything else is transient.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use common::messages::{
    ApiErrorBody, AuthRequest, AuthResponse, ErrorCode, TelegramIdValue, UserSummary,
    ValidateRequest, ValidateResponse,
};

/// Client-side view of an auth API call gone wrong.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server confirmed the account no longer exists. The only variant
    /// that tears a session down.
    #[error("user no longer exists on the server")]
    UserDeleted,

    /// The server understood the request and said no.
    #[error("auth service rejected the request: {reason}")]
    Rejected { reason: String },

    /// Timeouts, connection failures, 5xx responses, unparseable bodies.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The server seam the session agent talks through.
#[async_trait]
pub trait ValidationApi: Send + Sync {
    /// Exchange a raw init-data payload for a verified profile.
    async fn authenticate(&self, init_data: &str) -> Result<AuthResponse, ApiError>;

    /// Ask whether the given user still exists server-side.
    async fn validate(&self, telegram_id: i64) -> Result<UserSummary, ApiError>;
}

/// reqwest-backed implementation talking to the auth service.
pub struct HttpValidationApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpValidationApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    async fn post_json<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

#[async_trait]
impl ValidationApi for HttpValidationApi {
    async fn authenticate(&self, init_data: &str) -> Result<AuthResponse, ApiError> {
        let request = AuthRequest {
            init_data: init_data.to_string(),
        };
        let response = self.post_json("/api/auth/telegram", &request).await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<AuthResponse>()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()));
        }

        let reason = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("status {}", status),
        };
        if status.is_client_error() {
            Err(ApiError::Rejected { reason })
        } else {
            Err(ApiError::Transport(reason))
        }
    }

    async fn validate(&self, telegram_id: i64) -> Result<UserSummary, ApiError> {
        let request = ValidateRequest {
            telegram_id: Some(TelegramIdValue::Int(telegram_id)),
        };
        let response = self.post_json("/api/validate-user", &request).await?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .json::<ValidateResponse>()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?;
            return Ok(body.user);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            // A plain 404 (wrong route, proxy hiccup) is not proof of
            // deletion and must not cost anyone their session.
            if let Ok(body) = response.json::<ApiErrorBody>().await {
                if body.code == Some(ErrorCode::UserDeleted) {
                    return Err(ApiError::UserDeleted);
                }
                return Err(ApiError::Transport(body.error));
            }
            return Err(ApiError::Transport("404 without deletion code".to_string()));
        }

        Err(ApiError::Transport(format!("status {}", status)))
    }
}
