//! Shared HTTP API helpers
//!
//! Framework-free pieces used by the league server: request authentication
//! primitives and their database helpers.

pub mod auth;

pub use auth::{
    calculate_hash, sign_body, validate_hash, validate_request, validate_timestamp, ApiAuthError,
    TimestampWindow,
};

#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
