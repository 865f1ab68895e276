//! Bulk rollover - plan, journal, sharded apply, snapshot
//!
//! The plan is persisted before any record is touched. Each entry is applied
//! under its participant lock as one record write that also stamps
//! `rollover_generation`, so a resumed sweep recognizes work it already did.

use super::core::LeagueEngine;
use crate::period::PeriodId;
use crate::rollover::{
    plan_rollover, EntryStatus, PeriodSnapshot, RolloverDecision, RolloverJournal, RolloverOutcome,
};
use league_common::events::LeagueEvent;
use league_common::{Error, Result};
use tracing::{debug, error, info, warn};

impl LeagueEngine {
    /// Settle every closed period in bulk
    ///
    /// Resumes an unfinished journal if one exists. Returns
    /// [`RolloverOutcome::UpToDate`] with the latest snapshot when nothing is
    /// left to settle, and fails with `RolloverInProgress` while another sweep
    /// runs.
    pub async fn trigger_rollover(&self) -> Result<RolloverOutcome> {
        let _gate = self
            .rollover_gate
            .try_lock()
            .map_err(|_| Error::RolloverInProgress(self.current_period().to_string()))?;

        let current = self.current_period();

        let (mut journal, resumed) = match self.store.load_journal().await? {
            Some(journal) => {
                info!(
                    "Resuming rollover {} of {} ({}/{} done)",
                    journal.rollover_id,
                    journal.period_id,
                    journal.processed(),
                    journal.total()
                );
                (journal, true)
            }
            None => {
                let unsettled = self.store.list_unsettled(current).await?;
                let zones = self.settings.zones();
                match plan_rollover(&unsettled, &self.catalog, &zones, current, self.clock.now()) {
                    Some(journal) => {
                        self.store.save_journal(&journal).await?;
                        info!(
                            "Planned rollover {} closing {}: {} participants",
                            journal.rollover_id,
                            journal.period_id,
                            journal.total()
                        );
                        (journal, false)
                    }
                    None => {
                        debug!("No unsettled participants before {}", current);
                        let latest = self.store.recent_snapshots(1).await?.into_iter().next();
                        return Ok(RolloverOutcome::UpToDate(latest));
                    }
                }
            }
        };

        self.events.emit_lossy(LeagueEvent::RolloverStarted {
            period_id: journal.period_id.to_string(),
            total: journal.total(),
            resumed,
            timestamp: self.clock.now(),
        });

        self.apply_journal(&mut journal).await?;

        let total_participants = self.store.count().await?;
        let snapshot = PeriodSnapshot::from_journal(&journal, total_participants, self.clock.now());
        self.store.save_snapshot(&snapshot).await?;
        self.store.clear_journal().await?;

        info!(
            "Rollover of {} complete: {} promoted, {} demoted, {} processed",
            snapshot.period_id,
            snapshot.promotions.len(),
            snapshot.demotions.len(),
            snapshot.processed
        );
        self.events.emit_lossy(LeagueEvent::RolloverCompleted {
            period_id: snapshot.period_id.to_string(),
            next_period_id: snapshot.next_period_id.to_string(),
            promotions: snapshot.promotions.len(),
            demotions: snapshot.demotions.len(),
            total_participants,
            timestamp: snapshot.rollover_timestamp,
        });

        Ok(RolloverOutcome::Completed(snapshot))
    }

    /// Apply pending entries shard by shard, saving progress after each shard
    async fn apply_journal(&self, journal: &mut RolloverJournal) -> Result<()> {
        let total = journal.total();
        let shard_size = self.settings.rollover_shard_size.max(1);
        let next = journal.next_period_id;
        let mut start = journal.cursor();

        while start < total {
            let end = (start + shard_size).min(total);

            for index in start..end {
                if journal.entries[index].status != EntryStatus::Pending {
                    continue;
                }
                match self.apply_entry(&journal.entries[index], next).await {
                    Ok(status) => journal.entries[index].status = status,
                    Err(e) => return Err(self.abandon(journal, e).await),
                }
            }

            if let Err(e) = self.store.save_journal(journal).await {
                return Err(self.abandon(journal, e).await);
            }
            debug!("Rollover progress {}/{}", end, total);
            start = end;
        }

        Ok(())
    }

    /// Close one participant's period and apply their tier decision
    ///
    /// A record closed lazily since planning keeps its archived period; the
    /// sweep writes back its rank and applies the transition, unless the
    /// record has changed tier in the meantime.
    async fn apply_entry(&self, entry: &RolloverDecision, next: PeriodId) -> Result<EntryStatus> {
        let _guard = self.locks.lock(&entry.participant_id).await;

        let Some(mut record) = self.store.get(&entry.participant_id).await? else {
            warn!("Participant {} vanished during rollover", entry.participant_id);
            return Ok(EntryStatus::Skipped);
        };

        if record.rollover_generation == Some(entry.closed_period) {
            return Ok(EntryStatus::Applied);
        }

        if record.current_period_id == entry.closed_period {
            record.close_period(Some(entry.rank), next, self.settings.history_retention);
        } else if let Some(archived) = record
            .history
            .iter_mut()
            .find(|r| r.period_id == entry.closed_period)
        {
            archived.rank_in_instance = Some(entry.rank);
        } else {
            return Ok(EntryStatus::Skipped);
        }
        record.rollover_generation = Some(entry.closed_period);

        if record.tier_id != entry.from_tier {
            debug!(
                "{} left {} before the sweep reached it",
                record.participant_id, entry.from_tier
            );
            record.version = self.store.save(&record).await?;
            return Ok(EntryStatus::Skipped);
        }

        if entry.changes_tier() {
            self.save_in_tier(&mut record, &entry.to_tier).await?;
            debug!(
                "{} {:?} {} -> {} at rank {}",
                record.participant_id, entry.kind, entry.from_tier, entry.to_tier, entry.rank
            );
        } else {
            record.version = self.store.save(&record).await?;
        }

        Ok(EntryStatus::Applied)
    }

    /// Persist what progress we can and describe the partial sweep
    async fn abandon(&self, journal: &RolloverJournal, cause: Error) -> Error {
        let processed = journal.processed();
        let total = journal.total();
        error!(
            "Rollover of {} stopped at {}/{}: {}",
            journal.period_id, processed, total, cause
        );
        if let Err(e) = self.store.save_journal(journal).await {
            warn!("Could not save rollover progress: {}", e);
        }
        Error::RolloverIncomplete {
            processed,
            total,
            reason: cause.to_string(),
        }
    }
}
