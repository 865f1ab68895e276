//! Ledger persistence
//!
//! The engine only sees [`LeagueStore`]. Two backends:
//! - [`MemoryStore`]: process-local, used by tests and `--backend memory`
//! - [`SqliteStore`]: sqlx/SQLite, the default
//!
//! Every record write carries the version the writer read. A mismatch means
//! someone else wrote in between and yields [`league_common::Error::Conflict`].

use crate::ledger::ParticipantRecord;
use crate::partition::InstancePopulation;
use crate::period::PeriodId;
use crate::rollover::{PeriodSnapshot, RolloverJournal};
use async_trait::async_trait;
use league_common::Result;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait LeagueStore: Send + Sync {
    async fn get(&self, participant_id: &str) -> Result<Option<ParticipantRecord>>;

    /// Insert (`version == 0`) or update (`version` must match the stored one)
    ///
    /// Returns the version now stored.
    async fn save(&self, record: &ParticipantRecord) -> Result<i64>;

    /// All records placed in one instance, in no particular order
    async fn list_instance(&self, tier_id: &str, slot: u32) -> Result<Vec<ParticipantRecord>>;

    /// Records still holding a closed period no bulk rollover has settled,
    /// sorted by participant id
    ///
    /// Covers stale records and records closed lazily since the last sweep;
    /// see [`ParticipantRecord::unsettled_standing`].
    async fn list_unsettled(&self, current: PeriodId) -> Result<Vec<ParticipantRecord>>;

    /// Participant count per slot of `tier_id`
    async fn instance_population(&self, tier_id: &str) -> Result<InstancePopulation>;

    async fn count(&self) -> Result<usize>;

    /// Top `limit` records in global order as seen from `current`
    async fn top_by_cumulative(&self, limit: usize, current: PeriodId) -> Result<Vec<ParticipantRecord>>;

    /// Store a snapshot, replacing any earlier one for the same period
    async fn save_snapshot(&self, snapshot: &PeriodSnapshot) -> Result<()>;

    /// Newest first
    async fn recent_snapshots(&self, limit: usize) -> Result<Vec<PeriodSnapshot>>;

    async fn load_journal(&self) -> Result<Option<RolloverJournal>>;

    async fn save_journal(&self, journal: &RolloverJournal) -> Result<()>;

    async fn clear_journal(&self) -> Result<()>;
}

pub(crate) fn version_conflict(participant_id: &str, expected: i64, found: Option<i64>) -> league_common::Error {
    match found {
        Some(found) => league_common::Error::Conflict(format!(
            "participant '{}' is at version {}, write expected {}",
            participant_id, found, expected
        )),
        None if expected == 0 => league_common::Error::Conflict(format!(
            "participant '{}' already exists",
            participant_id
        )),
        None => league_common::Error::Conflict(format!(
            "participant '{}' vanished before write at version {}",
            participant_id, expected
        )),
    }
}
