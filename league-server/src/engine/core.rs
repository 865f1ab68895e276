//! Core league engine - construction and shared plumbing
//!
//! **Responsibilities:**
//! - LeagueEngine struct definition and initialization
//! - Per-participant write serialization (sharded locks)
//! - Instance placement under the placement lock
//! - Lazy per-participant period close

use crate::config::LeagueSettings;
use crate::ledger::ParticipantRecord;
use crate::partition::{stable_hash, Partitioner};
use crate::period::PeriodId;
use crate::ranking::{rank_closed_period, rank_instance, rank_of};
use crate::store::LeagueStore;
use crate::tiers::TierCatalog;
use chrono::{DateTime, Utc};
use league_common::events::EventBus;
use league_common::time::Clock;
use league_common::{Error, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Fixed table of mutexes keyed by participant id hash
pub(super) struct ParticipantLocks {
    shards: Vec<Mutex<()>>,
}

impl ParticipantLocks {
    fn new(count: usize) -> Self {
        Self {
            shards: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(super) async fn lock(&self, participant_id: &str) -> MutexGuard<'_, ()> {
        let index = (stable_hash(participant_id) % self.shards.len() as u64) as usize;
        self.shards[index].lock().await
    }
}

/// League engine - owns every mutation of the ledger
pub struct LeagueEngine {
    pub(super) store: Arc<dyn LeagueStore>,
    pub(super) catalog: TierCatalog,
    pub(super) partitioner: Partitioner,
    pub(super) settings: LeagueSettings,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) events: EventBus,

    pub(super) locks: ParticipantLocks,

    /// Serializes slot choice with the write that claims the slot, so two
    /// concurrent placements cannot both see the same free seat
    pub(super) placement: Mutex<()>,

    /// Held for the whole of a bulk rollover
    pub(super) rollover_gate: Mutex<()>,
}

impl LeagueEngine {
    pub fn new(
        store: Arc<dyn LeagueStore>,
        catalog: TierCatalog,
        settings: LeagueSettings,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            partitioner: settings.partitioner(),
            locks: ParticipantLocks::new(settings.lock_shards),
            store,
            catalog,
            settings,
            clock,
            events,
            placement: Mutex::new(()),
            rollover_gate: Mutex::new(()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Period containing the engine clock's current time
    pub fn current_period(&self) -> PeriodId {
        PeriodId::containing(self.clock.now())
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &LeagueSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn LeagueStore> {
        &self.store
    }

    pub(super) async fn load(&self, participant_id: &str) -> Result<ParticipantRecord> {
        self.store
            .get(participant_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("participant '{}'", participant_id)))
    }

    /// Persist `record` in `target_tier`, choosing a new slot when the tier
    /// changes or the record is new
    ///
    /// Returns the previous tier id when an existing record changed tier.
    pub(super) async fn save_in_tier(
        &self,
        record: &mut ParticipantRecord,
        target_tier: &str,
    ) -> Result<Option<String>> {
        let is_new = record.version == 0;
        if !is_new && record.tier_id == target_tier {
            record.version = self.store.save(record).await?;
            return Ok(None);
        }

        let _placement = self.placement.lock().await;
        let population = self.store.instance_population(target_tier).await?;
        let slot = self.partitioner.assign(&record.participant_id, &population);

        let previous = (!is_new).then(|| record.tier_id.clone());
        record.place(target_tier, slot);
        record.version = self.store.save(record).await?;

        debug!(
            "Placed {} in {} ({:?} strategy)",
            record.participant_id,
            record.instance_id,
            self.partitioner.strategy()
        );
        Ok(previous)
    }

    /// Archive a stale period in place; no tier transition
    ///
    /// The archived rank uses the closing scores of every instance-mate from
    /// that period, including mates that were already closed lazily.
    pub(super) async fn close_stale_period(
        &self,
        record: &mut ParticipantRecord,
        current: PeriodId,
    ) -> Result<()> {
        if !record.is_stale(current) {
            return Ok(());
        }
        let Some(own) = record.unsettled_standing(current) else {
            return Ok(());
        };

        let mates = self
            .store
            .list_instance(&record.tier_id, record.instance_slot)
            .await?;
        let standings: Vec<_> = mates
            .iter()
            .filter(|m| m.participant_id != record.participant_id)
            .filter_map(|m| m.unsettled_standing(current))
            .filter(|s| {
                s.period_id == own.period_id
                    && s.tier_id == own.tier_id
                    && s.instance_slot == own.instance_slot
            })
            .chain(std::iter::once(own.clone()))
            .collect();
        let rank = rank_closed_period(&standings)
            .into_iter()
            .find(|(s, _)| s.participant_id == record.participant_id)
            .map(|(_, rank)| rank);

        debug!(
            "Lazy rollover of {} from {} to {}",
            record.participant_id, record.current_period_id, current
        );
        record.close_period(rank, current, self.settings.history_retention);
        Ok(())
    }

    /// Rank of a stored record within its instance as seen from `current`
    pub(super) async fn rank_in_instance(
        &self,
        record: &ParticipantRecord,
        current: PeriodId,
    ) -> Result<(Vec<crate::ranking::RankedEntry>, usize)> {
        let mates = self
            .store
            .list_instance(&record.tier_id, record.instance_slot)
            .await?;
        let ranked = rank_instance(&mates, current);
        let rank = rank_of(&ranked, &record.participant_id).ok_or_else(|| {
            Error::Internal(format!(
                "participant '{}' missing from its instance {}",
                record.participant_id, record.instance_id
            ))
        })?;
        Ok((ranked, rank))
    }
}
