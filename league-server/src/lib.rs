//! league-server library - weekly competitive leagues
//!
//! Participants are grouped into bounded instances per tier, ranked by
//! weekly points, and promoted or demoted when the ISO week closes.

use axum::Router;
use league_common::api::auth::TimestampWindow;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod partition;
pub mod period;
pub mod ranking;
pub mod rollover;
pub mod scheduler;
pub mod store;
pub mod tiers;

use engine::LeagueEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LeagueEngine>,
    /// Secret for the administrative routes; 0 disables authentication
    pub shared_secret: i64,
    pub auth_window: TimestampWindow,
}

impl AppState {
    pub fn new(engine: Arc<LeagueEngine>, shared_secret: i64) -> Self {
        Self {
            engine,
            shared_secret,
            auth_window: TimestampWindow::default(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Administrative routes (require authentication)
    let protected = Router::new()
        .route("/leagues/rollover", post(api::handlers::rollover))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/leagues/join", post(api::handlers::join))
        .route("/leagues/score", post(api::handlers::record_score))
        .route("/leagues/rankings/:participant_id", get(api::handlers::rankings))
        .route("/leagues/user/:participant_id", get(api::handlers::participant))
        .route("/leagues/leaderboard/global", get(api::handlers::global_leaderboard))
        .route("/leagues/snapshots", get(api::handlers::snapshots))
        .route("/leagues/events", get(api::event_stream))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
