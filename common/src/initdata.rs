// common/src/initdata.rs
//
// Telegram WebApp init-data verification. The payload's `hash` field must
// equal HMAC-SHA256 over the data-check-string (every other key=value pair,
// sorted by key, joined with newlines), keyed with
// HMAC-SHA256(key = "WebAppData", message = bot_token).
//
// Everything here is pure: no I/O, no logging, no panics on any input. The
// bot token is only ever fed into the HMAC.
use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use url::form_urlencoded;

use crate::models::identity::Identity;
use crate::utils::unix_timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Decoded init-data pairs in canonical (sorted) key order. Duplicate keys
/// keep the last occurrence.
pub type InitDataFields = BTreeMap<String, String>;

/// Why a payload failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("no init data provided")]
    MissingPayload,
    #[error("bot token is not configured")]
    MissingSecret,
    #[error("init data carries no hash field")]
    MissingHash,
    #[error("init data carries no auth_date field")]
    MissingAuthDate,
    #[error("init data is too old")]
    Stale,
    #[error("hash mismatch")]
    HashMismatch,
}

impl VerifyFailure {
    /// Stable machine-readable reason string used on the wire and in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingPayload => "missing-payload",
            Self::MissingSecret => "missing-secret",
            Self::MissingHash => "missing-hash",
            Self::MissingAuthDate => "missing-auth-date",
            Self::Stale => "stale",
            Self::HashMismatch => "hash-mismatch",
        }
    }
}

/// Verification knobs. The defaults match Telegram's documented behavior:
/// payloads older than a day are rejected, but a payload without any
/// `auth_date` still passes the freshness check.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub max_age_seconds: u64,
    /// Strict mode: reject payloads whose `auth_date` is absent or not an
    /// integer instead of skipping the freshness check.
    pub require_auth_date: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            max_age_seconds: 86_400,
            require_auth_date: false,
        }
    }
}

/// Split and percent-decode the raw payload into sorted key/value pairs.
///
/// Decoding is lenient the way URLSearchParams is: `+` becomes a space and
/// malformed percent-sequences decode to replacement characters rather than
/// erroring (the signature check rejects anything that was mangled).
pub fn parse_init_data(raw: &str) -> InitDataFields {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// The string the signature covers: every pair except `hash`, formatted
/// `key=value` and joined with newlines in sorted key order.
pub fn build_data_check_string(fields: &InitDataFields) -> String {
    fields
        .iter()
        .filter(|(k, _)| k.as_str() != "hash")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Derive the per-bot signing key: HMAC-SHA256 keyed with the literal
/// string "WebAppData" over the bot token.
pub fn derive_secret_key(bot_token: &str) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(b"WebAppData").expect("HMAC can take key of any size");
    mac.update(bot_token.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Verify `raw` against `bot_token` using the system clock.
pub fn validate_init_data(
    raw: &str,
    bot_token: &str,
    options: &ValidateOptions,
) -> Result<InitDataFields, VerifyFailure> {
    validate_init_data_at(raw, bot_token, options, unix_timestamp())
}

/// Deterministic verification core with an injected clock.
///
/// Checks run in a fixed order: blank payload, blank secret, missing hash,
/// freshness, then the signature itself. The hash comparison is
/// constant-time; a received hash that is not valid hex (or the wrong
/// length) counts as a mismatch rather than an error. On success the parsed
/// fields are returned so callers extract the identity without re-parsing.
pub fn validate_init_data_at(
    raw: &str,
    bot_token: &str,
    options: &ValidateOptions,
    now_unix: i64,
) -> Result<InitDataFields, VerifyFailure> {
    if raw.trim().is_empty() {
        return Err(VerifyFailure::MissingPayload);
    }
    if bot_token.is_empty() {
        return Err(VerifyFailure::MissingSecret);
    }

    let fields = parse_init_data(raw);
    let received_hash = match fields.get("hash") {
        Some(h) if !h.is_empty() => h.as_str(),
        _ => return Err(VerifyFailure::MissingHash),
    };

    // Freshness before the signature: a stale payload is rejected as stale
    // even when it was also tampered with. auth_date is attacker-controlled,
    // so the age arithmetic must not overflow.
    match fields.get("auth_date").and_then(|v| v.parse::<i64>().ok()) {
        Some(auth_date) => {
            if now_unix.saturating_sub(auth_date) > options.max_age_seconds as i64 {
                return Err(VerifyFailure::Stale);
            }
        }
        None if options.require_auth_date => {
            return Err(VerifyFailure::MissingAuthDate);
        }
        None => {}
    }

    let received = match hex::decode(received_hash) {
        Ok(bytes) => bytes,
        Err(_) => return Err(VerifyFailure::HashMismatch),
    };

    let secret = derive_secret_key(bot_token);
    let mut mac = HmacSha256::new_from_slice(&secret).expect("HMAC can take key of any size");
    mac.update(build_data_check_string(&fields).as_bytes());

    // verify_slice is constant-time and treats a length mismatch as plain
    // inequality.
    mac.verify_slice(&received)
        .map_err(|_| VerifyFailure::HashMismatch)?;

    Ok(fields)
}

/// The `user` field was present but unusable.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("bad user payload in init data: {0}")]
    BadUserPayload(#[from] serde_json::Error),
}

/// Pull the authenticated identity out of verified fields.
///
/// `Ok(None)` when the payload carried no `user` field (or an empty one).
/// Only call this with fields returned by `validate_init_data*`; nothing
/// here re-checks the signature.
pub fn extract_identity(fields: &InitDataFields) -> Result<Option<Identity>, ExtractError> {
    match fields.get("user") {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => {
            let identity: Identity = serde_json::from_str(raw)?;
            Ok(Some(identity))
        }
    }
}

/// Build a correctly signed payload from raw (unencoded) pairs. The pairs
/// must not include `hash`; it is appended.
#[cfg(any(test, feature = "test-utils"))]
pub fn signed_init_data(pairs: &[(&str, &str)], bot_token: &str) -> String {
    let fields: InitDataFields = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let secret = derive_secret_key(bot_token);
    let mut mac = HmacSha256::new_from_slice(&secret).expect("HMAC can take key of any size");
    mac.update(build_data_check_string(&fields).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}
