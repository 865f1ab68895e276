//! HTTP API for league-server

pub mod auth;
pub mod error;
pub mod handlers;
pub mod health;
pub mod sse;

pub use auth::auth_middleware;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use sse::event_stream;
