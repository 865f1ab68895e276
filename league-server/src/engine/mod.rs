//! League engine
//!
//! **Module Structure:**
//! - `core.rs`: engine struct, construction, participant locks, placement
//! - `participants.rs`: join and score recording (with lazy rollover)
//! - `views.rs`: read-only rankings, participant and global views
//! - `rollover.rs`: bulk rollover trigger and journal application

mod core;
mod participants;
mod rollover;
mod views;

pub use self::core::LeagueEngine;
pub use participants::{JoinOutcome, JoinRequest, ScoreOutcome};
pub use views::{GlobalLeaderboard, ParticipantView, RankingsView};

/// Global leaderboard size when the caller gives none
pub const DEFAULT_GLOBAL_LIMIT: usize = 100;
/// Largest global leaderboard served
pub const MAX_GLOBAL_LIMIT: usize = 1000;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 10;
pub const MAX_SNAPSHOT_LIMIT: usize = 100;
