//! Rollover planning
//!
//! Pure half of the period controller: given the unsettled records, decide one
//! transition per participant and describe the result. Applying the plan
//! (locks, persistence, resumption) is the engine's job.

use crate::ledger::{ClosedStanding, ParticipantRecord};
use crate::period::PeriodId;
use crate::ranking::{rank_closed_period, Zone, Zones};
use crate::tiers::TierCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Promotion,
    Demotion,
    Stay,
}

/// Progress of one journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Pending,
    Applied,
    /// Record left the closed period before the sweep reached it
    Skipped,
}

/// Planned outcome for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverDecision {
    pub participant_id: String,
    /// Period being closed for this participant
    pub closed_period: PeriodId,
    pub from_tier: String,
    pub to_tier: String,
    pub rank: usize,
    pub kind: TransitionKind,
    /// Zone asked for a move but the tier was already at the catalog edge
    pub blocked_at_boundary: bool,
    #[serde(default)]
    pub status: EntryStatus,
}

impl RolloverDecision {
    pub fn changes_tier(&self) -> bool {
        self.from_tier != self.to_tier
    }
}

/// Persisted plan of an in-flight bulk rollover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverJournal {
    pub rollover_id: Uuid,
    /// Newest closed period in the plan
    pub period_id: PeriodId,
    pub next_period_id: PeriodId,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<RolloverDecision>,
}

impl RolloverJournal {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Entries no longer pending
    pub fn processed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != EntryStatus::Pending)
            .count()
    }

    /// Index of the first pending entry
    pub fn cursor(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.status == EntryStatus::Pending)
            .unwrap_or(self.entries.len())
    }

    pub fn is_finished(&self) -> bool {
        self.cursor() == self.entries.len()
    }
}

/// Tier move recorded in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierTransition {
    pub participant_id: String,
    pub from_tier: String,
    pub to_tier: String,
    pub rank: usize,
}

/// Stored summary of one completed bulk rollover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSnapshot {
    pub snapshot_id: Uuid,
    pub period_id: PeriodId,
    pub next_period_id: PeriodId,
    pub rollover_timestamp: DateTime<Utc>,
    pub promotions: Vec<TierTransition>,
    pub demotions: Vec<TierTransition>,
    pub total_participants: usize,
    pub processed: usize,
}

impl PeriodSnapshot {
    /// Summarize a finished journal
    pub fn from_journal(
        journal: &RolloverJournal,
        total_participants: usize,
        rollover_timestamp: DateTime<Utc>,
    ) -> Self {
        let mut promotions = Vec::new();
        let mut demotions = Vec::new();

        for entry in journal
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Applied && e.changes_tier())
        {
            let transition = TierTransition {
                participant_id: entry.participant_id.clone(),
                from_tier: entry.from_tier.clone(),
                to_tier: entry.to_tier.clone(),
                rank: entry.rank,
            };
            match entry.kind {
                TransitionKind::Promotion => promotions.push(transition),
                TransitionKind::Demotion => demotions.push(transition),
                TransitionKind::Stay => {}
            }
        }

        Self {
            snapshot_id: Uuid::new_v4(),
            period_id: journal.period_id,
            next_period_id: journal.next_period_id,
            rollover_timestamp,
            promotions,
            demotions,
            total_participants,
            processed: journal
                .entries
                .iter()
                .filter(|e| e.status == EntryStatus::Applied)
                .count(),
        }
    }
}

/// Result of a bulk rollover trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    Completed(PeriodSnapshot),
    /// Nothing was left to settle; carries the latest snapshot if any
    UpToDate(Option<PeriodSnapshot>),
}

/// Decide the transition for one ranked participant
pub fn decide(catalog: &TierCatalog, zones: &Zones, tier_id: &str, rank: usize) -> (TransitionKind, String, bool) {
    match zones.classify(rank) {
        Zone::Promotion => match catalog.next_tier(tier_id) {
            Some(next) => (TransitionKind::Promotion, next.id.clone(), false),
            None => (TransitionKind::Stay, tier_id.to_string(), true),
        },
        Zone::Demotion => match catalog.previous_tier(tier_id) {
            Some(prev) => (TransitionKind::Demotion, prev.id.clone(), false),
            None => (TransitionKind::Stay, tier_id.to_string(), true),
        },
        Zone::Safe => (TransitionKind::Stay, tier_id.to_string(), false),
    }
}

/// Build a journal for every record with an unsettled closed period
///
/// Standings are grouped by (closed period, tier, slot) and ranked within
/// their group by the scores the period closed with, so mates that were
/// closed lazily keep their place. Returns `None` when nothing is unsettled.
pub fn plan_rollover(
    records: &[ParticipantRecord],
    catalog: &TierCatalog,
    zones: &Zones,
    current: PeriodId,
    created_at: DateTime<Utc>,
) -> Option<RolloverJournal> {
    let standings: Vec<ClosedStanding> = records
        .iter()
        .filter_map(|r| r.unsettled_standing(current))
        .collect();

    let mut groups: BTreeMap<(PeriodId, &str, u32), Vec<&ClosedStanding>> = BTreeMap::new();
    for standing in &standings {
        groups
            .entry((
                standing.period_id,
                standing.tier_id.as_str(),
                standing.instance_slot,
            ))
            .or_default()
            .push(standing);
    }

    let newest_closed = groups.keys().map(|(period, _, _)| *period).max()?;

    let mut entries = Vec::new();
    for ((period, tier_id, _), members) in groups {
        for (standing, rank) in rank_closed_period(members) {
            let (kind, to_tier, blocked_at_boundary) = decide(catalog, zones, tier_id, rank);
            entries.push(RolloverDecision {
                participant_id: standing.participant_id.clone(),
                closed_period: period,
                from_tier: tier_id.to_string(),
                to_tier,
                rank,
                kind,
                blocked_at_boundary,
                status: EntryStatus::Pending,
            });
        }
    }

    Some(RolloverJournal {
        rollover_id: Uuid::new_v4(),
        period_id: newest_closed,
        next_period_id: current,
        created_at,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::TierDefinition;
    use std::collections::HashSet;

    fn week(s: &str) -> PeriodId {
        s.parse().unwrap()
    }

    fn zones() -> Zones {
        Zones {
            capacity: 50,
            promotion_cutoff: 10,
            demotion_cutoff: 10,
        }
    }

    fn three_tiers() -> TierCatalog {
        TierCatalog::new(vec![
            TierDefinition::new("bronze", "Bronze", 0, "", ""),
            TierDefinition::new("silver", "Silver", 500, "", ""),
            TierDefinition::new("gold", "Gold", 1500, "", ""),
        ])
        .unwrap()
    }

    fn instance(tier: &str, n: usize, period: PeriodId) -> Vec<ParticipantRecord> {
        (0..n)
            .map(|i| {
                let mut r = ParticipantRecord::new(&format!("{}-p{:02}", tier, i), "x", None, 0, tier, 0, period);
                // p00 scores highest
                r.period_score = (n - i) as u64 * 10;
                r
            })
            .collect()
    }

    #[test]
    fn test_plan_boundaries_for_full_instance() {
        let closed = week("2026-W41");
        let records = instance("silver", 50, closed);
        let journal = plan_rollover(&records, &three_tiers(), &zones(), closed.next(), Utc::now()).unwrap();

        let by_rank = |rank: usize| journal.entries.iter().find(|e| e.rank == rank).unwrap();
        assert_eq!(by_rank(10).kind, TransitionKind::Promotion);
        assert_eq!(by_rank(10).to_tier, "gold");
        assert_eq!(by_rank(11).kind, TransitionKind::Stay);
        assert_eq!(by_rank(40).kind, TransitionKind::Stay);
        assert_eq!(by_rank(41).kind, TransitionKind::Demotion);
        assert_eq!(by_rank(41).to_tier, "bronze");
        assert_eq!(journal.period_id, closed);
        assert_eq!(journal.next_period_id, closed.next());
    }

    #[test]
    fn test_boundary_tiers_are_blocked_not_moved() {
        let closed = week("2026-W41");
        let mut records = instance("gold", 50, closed);
        records.extend(instance("bronze", 50, closed));
        let journal = plan_rollover(&records, &three_tiers(), &zones(), closed.next(), Utc::now()).unwrap();

        for entry in &journal.entries {
            if entry.from_tier == "gold" {
                assert_ne!(entry.kind, TransitionKind::Promotion);
            }
            if entry.from_tier == "bronze" {
                assert_ne!(entry.kind, TransitionKind::Demotion);
            }
        }
        let blocked = journal.entries.iter().filter(|e| e.blocked_at_boundary).count();
        assert_eq!(blocked, 20);
    }

    #[test]
    fn test_one_decision_per_participant() {
        let closed = week("2026-W41");
        let records = instance("silver", 7, closed);
        let tight = Zones {
            capacity: 5,
            promotion_cutoff: 4,
            demotion_cutoff: 4,
        };
        let journal = plan_rollover(&records, &three_tiers(), &tight, closed.next(), Utc::now()).unwrap();

        let ids: HashSet<_> = journal.entries.iter().map(|e| &e.participant_id).collect();
        assert_eq!(ids.len(), journal.entries.len());
        assert_eq!(journal.total(), 7);
    }

    #[test]
    fn test_nothing_stale_yields_no_plan() {
        let current = week("2026-W42");
        let records = instance("silver", 5, current);
        assert!(plan_rollover(&records, &three_tiers(), &zones(), current, Utc::now()).is_none());
    }

    #[test]
    fn test_lazily_closed_mates_keep_their_rank() {
        let closed = week("2026-W41");
        let current = closed.next();
        let mut records = instance("bronze", 11, closed);
        // The leader played early in the new week
        records[0].close_period(Some(1), current, 0);
        records[0].add_score(1);

        let journal = plan_rollover(&records, &three_tiers(), &zones(), current, Utc::now()).unwrap();
        let entry = |id: &str| journal.entries.iter().find(|e| e.participant_id == id).unwrap();

        assert_eq!(journal.total(), 11);
        assert_eq!(entry("bronze-p00").rank, 1);
        assert_eq!(entry("bronze-p00").kind, TransitionKind::Promotion);
        assert_eq!(entry("bronze-p10").rank, 11);
        assert_eq!(entry("bronze-p10").kind, TransitionKind::Stay);

        // Settled records drop out of the next plan
        for record in records.iter_mut() {
            record.rollover_generation = Some(closed);
            if record.is_stale(current) {
                record.close_period(None, current, 0);
            }
        }
        assert!(plan_rollover(&records, &three_tiers(), &zones(), current, Utc::now()).is_none());
    }

    #[test]
    fn test_groups_by_closed_period() {
        let current = week("2026-W42");
        let mut records = instance("silver", 3, week("2026-W41"));
        let mut straggler = ParticipantRecord::new("late", "x", None, 0, "silver", 0, week("2026-W39"));
        straggler.period_score = 1;
        records.push(straggler);

        let journal = plan_rollover(&records, &three_tiers(), &zones(), current, Utc::now()).unwrap();
        let late = journal.entries.iter().find(|e| e.participant_id == "late").unwrap();
        // Alone in its own group
        assert_eq!(late.rank, 1);
        assert_eq!(late.closed_period, week("2026-W39"));
        assert_eq!(journal.period_id, week("2026-W41"));
    }

    #[test]
    fn test_journal_progress_and_snapshot() {
        let closed = week("2026-W41");
        let records = instance("silver", 50, closed);
        let mut journal = plan_rollover(&records, &three_tiers(), &zones(), closed.next(), Utc::now()).unwrap();
        assert_eq!(journal.cursor(), 0);
        assert!(!journal.is_finished());

        for entry in journal.entries.iter_mut() {
            entry.status = EntryStatus::Applied;
        }
        journal.entries[49].status = EntryStatus::Skipped;
        assert!(journal.is_finished());
        assert_eq!(journal.processed(), 50);

        let snapshot = PeriodSnapshot::from_journal(&journal, 50, Utc::now());
        assert_eq!(snapshot.promotions.len(), 10);
        // Rank 50 was skipped
        assert_eq!(snapshot.demotions.len(), 9);
        assert_eq!(snapshot.processed, 49);
    }
}
