//! Server-Sent Events (SSE) utilities

use crate::events::{EventBus, LeagueEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Keep-alive interval for idle SSE connections
const KEEP_ALIVE_SECS: u64 = 15;

/// Convert one league event into an SSE frame
fn to_sse_event(event: &LeagueEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}

/// Stream every event published on `bus` to an SSE client
///
/// The stream opens with a `ConnectionStatus: connected` frame. Lagged
/// receivers drop the missed events and keep streaming.
pub fn event_bus_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let connected = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("ConnectionStatus").data("connected"))
    });

    let events = BroadcastStream::new(bus.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => {
                debug!("Broadcasting SSE event: {}", event.event_type());
                to_sse_event(&event).map(Ok)
            }
            Err(e) => {
                // Lagged receiver: events were dropped, keep going
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_to_sse_event_serializes() {
        let event = LeagueEvent::ParticipantJoined {
            participant_id: "p1".to_string(),
            tier_id: "bronze".to_string(),
            instance_id: "bronze-0".to_string(),
            timestamp: Utc::now(),
        };
        assert!(to_sse_event(&event).is_some());
    }
}
