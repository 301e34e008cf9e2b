// common/src/models/identity.rs
use serde::{Deserialize, Serialize};

/// Authenticated Telegram user identity, as carried in the `user` field of
/// a verified init-data payload.
///
/// Every profile field except `id` is optional on the wire; they all
/// normalize to the empty string here so downstream consumers never deal
/// with absent values. Unknown fields (language_code, is_premium, ...) are
/// ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Telegram user id. Required; a `user` object without it is rejected.
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub photo_url: String,
}
