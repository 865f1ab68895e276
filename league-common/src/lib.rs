//! # League Common Library
//!
//! Shared code for the league service crates:
//! - Error type
//! - Configuration root resolution and TOML loading
//! - SQLite bootstrap
//! - Clocks
//! - Event bus and SSE streaming
//! - Shared-secret request authentication

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
