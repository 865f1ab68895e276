//! Event types for the league event system
//!
//! Events are broadcast on an [`EventBus`] and serialized for SSE delivery.
//! Identifiers are carried as plain strings so every crate can emit and
//! consume them without depending on the engine's domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// League event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LeagueEvent {
    /// A participant joined for the first time
    ParticipantJoined {
        participant_id: String,
        tier_id: String,
        instance_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Score was added to a participant
    ScoreRecorded {
        participant_id: String,
        delta: u64,
        period_score: u64,
        cumulative_score: u64,
        rank: usize,
        /// Free-form tag describing the activity (lesson, practice, ...)
        activity_tag: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A participant moved between tiers outside of a bulk rollover
    ///
    /// Fired when a cumulative score crosses a threshold on join or score update.
    TierChanged {
        participant_id: String,
        from_tier: String,
        to_tier: String,
        instance_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Bulk rollover started (or resumed from its journal)
    RolloverStarted {
        period_id: String,
        total: usize,
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// Bulk rollover finished and its snapshot was stored
    RolloverCompleted {
        period_id: String,
        next_period_id: String,
        promotions: usize,
        demotions: usize,
        total_participants: usize,
        timestamp: DateTime<Utc>,
    },
}

impl LeagueEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LeagueEvent::ParticipantJoined { .. } => "ParticipantJoined",
            LeagueEvent::ScoreRecorded { .. } => "ScoreRecorded",
            LeagueEvent::TierChanged { .. } => "TierChanged",
            LeagueEvent::RolloverStarted { .. } => "RolloverStarted",
            LeagueEvent::RolloverCompleted { .. } => "RolloverCompleted",
        }
    }
}

/// Broadcast channel for [`LeagueEvent`]s
///
/// # Examples
///
/// ```
/// use league_common::events::EventBus;
///
/// let bus = EventBus::new(100);
/// let _rx = bus.subscribe();
/// assert_eq!(bus.capacity(), 100);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LeagueEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LeagueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LeagueEvent,
    ) -> Result<usize, broadcast::error::SendError<LeagueEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: LeagueEvent) {
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for {}", e.0.event_type());
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
