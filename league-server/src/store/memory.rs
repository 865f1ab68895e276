//! In-memory ledger backend

use super::{version_conflict, LeagueStore};
use crate::ledger::ParticipantRecord;
use crate::partition::InstancePopulation;
use crate::period::PeriodId;
use crate::ranking::global_order;
use crate::rollover::{PeriodSnapshot, RolloverJournal};
use async_trait::async_trait;
use league_common::Result;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    records: HashMap<String, ParticipantRecord>,
    snapshots: BTreeMap<PeriodId, PeriodSnapshot>,
    journal: Option<RolloverJournal>,
}

/// Ledger held in a single `RwLock`; reads clone under the read guard
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeagueStore for MemoryStore {
    async fn get(&self, participant_id: &str) -> Result<Option<ParticipantRecord>> {
        Ok(self.inner.read().await.records.get(participant_id).cloned())
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let stored = inner.records.get(&record.participant_id).map(|r| r.version);

        match (record.version, stored) {
            (0, None) => {}
            (expected, Some(found)) if expected == found => {}
            (expected, found) => {
                return Err(version_conflict(&record.participant_id, expected, found));
            }
        }

        let mut saved = record.clone();
        saved.version = record.version + 1;
        let version = saved.version;
        inner.records.insert(saved.participant_id.clone(), saved);
        Ok(version)
    }

    async fn list_instance(&self, tier_id: &str, slot: u32) -> Result<Vec<ParticipantRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .filter(|r| r.tier_id == tier_id && r.instance_slot == slot)
            .cloned()
            .collect())
    }

    async fn list_unsettled(&self, current: PeriodId) -> Result<Vec<ParticipantRecord>> {
        let inner = self.inner.read().await;
        let mut unsettled: Vec<_> = inner
            .records
            .values()
            .filter(|r| r.unsettled_standing(current).is_some())
            .cloned()
            .collect();
        unsettled.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        Ok(unsettled)
    }

    async fn instance_population(&self, tier_id: &str) -> Result<InstancePopulation> {
        let inner = self.inner.read().await;
        let mut population = InstancePopulation::new();
        for record in inner.records.values().filter(|r| r.tier_id == tier_id) {
            *population.entry(record.instance_slot).or_insert(0) += 1;
        }
        Ok(population)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().await.records.len())
    }

    async fn top_by_cumulative(&self, limit: usize, current: PeriodId) -> Result<Vec<ParticipantRecord>> {
        let mut all: Vec<_> = self.inner.read().await.records.values().cloned().collect();
        all.sort_by(|a, b| global_order(a, b, current));
        all.truncate(limit);
        Ok(all)
    }

    async fn save_snapshot(&self, snapshot: &PeriodSnapshot) -> Result<()> {
        self.inner
            .write()
            .await
            .snapshots
            .insert(snapshot.period_id, snapshot.clone());
        Ok(())
    }

    async fn recent_snapshots(&self, limit: usize) -> Result<Vec<PeriodSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.snapshots.values().rev().take(limit).cloned().collect())
    }

    async fn load_journal(&self) -> Result<Option<RolloverJournal>> {
        Ok(self.inner.read().await.journal.clone())
    }

    async fn save_journal(&self, journal: &RolloverJournal) -> Result<()> {
        self.inner.write().await.journal = Some(journal.clone());
        Ok(())
    }

    async fn clear_journal(&self) -> Result<()> {
        self.inner.write().await.journal = None;
        Ok(())
    }
}
