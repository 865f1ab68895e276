//! Shared-secret request authentication
//!
//! Administrative requests carry a `timestamp` (Unix epoch ms) and a `hash`
//! field in their JSON body. The hash is the SHA-256 of the canonical JSON
//! body (keys sorted, no whitespace, `hash` replaced by 64 zeros) followed by
//! the decimal shared secret. A secret of `0` disables checking.
//!
//! Only pure functions and database helpers live here; the axum middleware
//! wrapping them belongs to the server crate.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Placeholder substituted for the `hash` field before hashing
pub const HASH_PLACEHOLDER: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Authentication error types
#[derive(Debug, Clone, Error)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    #[error("Invalid hash")]
    InvalidHash { provided: String, calculated: String },

    /// Timestamp or hash field missing from request
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Database error loading shared secret
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Failed to parse request body
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Acceptable skew between a request timestamp and the server clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampWindow {
    pub max_past_ms: i64,
    pub max_future_ms: i64,
}

impl Default for TimestampWindow {
    fn default() -> Self {
        Self {
            max_past_ms: 5_000,
            max_future_ms: 1_000,
        }
    }
}

/// Load the shared secret from the settings table, generating one if absent
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(SHARED_SECRET_KEY)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((Some(value),)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        _ => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and persist it
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

/// Check a request timestamp against `now_ms`
///
/// # Examples
///
/// ```
/// use league_common::api::auth::{validate_timestamp, TimestampWindow};
///
/// let window = TimestampWindow::default();
/// assert!(validate_timestamp(10_000, 10_000, window).is_ok());
/// assert!(validate_timestamp(10_000 - 6_000, 10_000, window).is_err());
/// ```
pub fn validate_timestamp(
    timestamp: i64,
    now_ms: i64,
    window: TimestampWindow,
) -> Result<(), ApiAuthError> {
    let diff = now_ms - timestamp;

    if diff > window.max_past_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now: now_ms,
            reason: format!(
                "Timestamp {}ms too old (max {}ms past)",
                diff, window.max_past_ms
            ),
        });
    }

    if -diff > window.max_future_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now: now_ms,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                -diff, window.max_future_ms
            ),
        });
    }

    Ok(())
}

/// Calculate the request hash for `json_value` under `shared_secret`
///
/// # Examples
///
/// ```
/// use league_common::api::auth::calculate_hash;
/// use serde_json::json;
///
/// let body = json!({ "timestamp": 1730000000000i64, "hash": "" });
/// assert_eq!(calculate_hash(&body, 42).len(), 64);
/// ```
pub fn calculate_hash(json_value: &Value, shared_secret: i64) -> String {
    let mut value = json_value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert(
            "hash".to_string(),
            Value::String(HASH_PLACEHOLDER.to_string()),
        );
    }

    let to_hash = format!("{}{}", to_canonical_json(&value), shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("\"{}\":{}", k, to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Validate that `provided_hash` matches the body under `shared_secret`
pub fn validate_hash(
    provided_hash: &str,
    json_value: &Value,
    shared_secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(json_value, shared_secret);

    if provided_hash != calculated {
        return Err(ApiAuthError::InvalidHash {
            provided: provided_hash.to_string(),
            calculated,
        });
    }

    Ok(())
}

/// Validate both fields of an authenticated JSON body
pub fn validate_request(
    body: &Value,
    shared_secret: i64,
    now_ms: i64,
    window: TimestampWindow,
) -> Result<(), ApiAuthError> {
    if shared_secret == 0 {
        return Ok(());
    }

    let timestamp = body
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or(ApiAuthError::MissingField("timestamp"))?;
    let hash = body
        .get("hash")
        .and_then(Value::as_str)
        .ok_or(ApiAuthError::MissingField("hash"))?;

    validate_timestamp(timestamp, now_ms, window)?;
    validate_hash(hash, body, shared_secret)
}

/// Build a signed body: inserts `timestamp` and the matching `hash`
///
/// Used by admin tooling and tests to produce requests the server accepts.
pub fn sign_body(mut body: Value, shared_secret: i64, timestamp_ms: i64) -> Value {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("timestamp".to_string(), Value::from(timestamp_ms));
    }
    let hash = calculate_hash(&body, shared_secret);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(hash));
    }
    body
}
