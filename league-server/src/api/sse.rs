//! Server-Sent Events for league activity

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /leagues/events
///
/// Streams joins, score updates, tier changes and rollover progress.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    league_common::sse::event_bus_sse_stream(state.engine.events(), "league-server")
}
