//! Participant ledger records
//!
//! One [`ParticipantRecord`] per participant, created on first join and never
//! deleted. Persistence lives behind [`crate::store::LeagueStore`]; this module
//! only holds the record type and its in-memory state transitions.

use crate::partition::instance_id;
use crate::period::PeriodId;
use serde::{Deserialize, Serialize};

/// Archived result of one closed period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodResult {
    pub period_id: PeriodId,
    pub period_score: u64,
    /// Rank within the instance at close; optional so rows archived without
    /// a rank still load
    #[serde(default)]
    pub rank_in_instance: Option<usize>,
    pub tier_id: String,
    #[serde(default)]
    pub instance_slot: u32,
}

/// Where a record stood in a closed period no bulk rollover has settled yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedStanding {
    pub participant_id: String,
    pub period_id: PeriodId,
    pub tier_id: String,
    pub instance_slot: u32,
    pub period_score: u64,
    /// Cumulative score at the close of `period_id`
    pub cumulative_score: u64,
}

/// Ledger entry for one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub participant_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub cumulative_score: u64,
    pub period_score: u64,
    pub tier_id: String,
    pub instance_slot: u32,
    /// `"{tier_id}-{instance_slot}"`, kept in step by [`ParticipantRecord::place`]
    pub instance_id: String,
    /// Last period for which `period_score` is valid
    pub current_period_id: PeriodId,
    pub joined_period_id: PeriodId,
    /// Last period closed for this record by a bulk rollover
    pub rollover_generation: Option<PeriodId>,
    pub history: Vec<PeriodResult>,
    /// Optimistic concurrency counter; 0 means not yet stored
    pub version: i64,
}

impl ParticipantRecord {
    /// Fresh record for a first join, not yet persisted
    pub fn new(
        participant_id: &str,
        display_name: &str,
        avatar_ref: Option<String>,
        cumulative_score: u64,
        tier_id: &str,
        instance_slot: u32,
        period: PeriodId,
    ) -> Self {
        Self {
            participant_id: participant_id.to_string(),
            display_name: display_name.to_string(),
            avatar_ref,
            cumulative_score,
            period_score: 0,
            tier_id: tier_id.to_string(),
            instance_slot,
            instance_id: instance_id(tier_id, instance_slot),
            current_period_id: period,
            joined_period_id: period,
            rollover_generation: None,
            history: Vec::new(),
            version: 0,
        }
    }

    /// Move the record into a tier/slot
    pub fn place(&mut self, tier_id: &str, slot: u32) {
        self.tier_id = tier_id.to_string();
        self.instance_slot = slot;
        self.instance_id = instance_id(tier_id, slot);
    }

    /// Whether `period_score` belongs to a period before `current`
    pub fn is_stale(&self, current: PeriodId) -> bool {
        self.current_period_id < current
    }

    /// Period score as seen from `current`: stale scores count as 0
    pub fn effective_period_score(&self, current: PeriodId) -> u64 {
        if self.is_stale(current) {
            0
        } else {
            self.period_score
        }
    }

    /// Closed period still awaiting its bulk rollover, if any
    ///
    /// A stale record stands on its live fields. A record closed lazily stands
    /// on its newest history entry until `rollover_generation` reaches it.
    pub fn unsettled_standing(&self, current: PeriodId) -> Option<ClosedStanding> {
        if self.is_stale(current) {
            return Some(ClosedStanding {
                participant_id: self.participant_id.clone(),
                period_id: self.current_period_id,
                tier_id: self.tier_id.clone(),
                instance_slot: self.instance_slot,
                period_score: self.period_score,
                cumulative_score: self.cumulative_score,
            });
        }

        let last = self.history.last()?;
        if last.period_id >= current || self.rollover_generation == Some(last.period_id) {
            return None;
        }
        Some(ClosedStanding {
            participant_id: self.participant_id.clone(),
            period_id: last.period_id,
            tier_id: last.tier_id.clone(),
            instance_slot: last.instance_slot,
            period_score: last.period_score,
            cumulative_score: self.cumulative_score.saturating_sub(self.period_score),
        })
    }

    pub fn add_score(&mut self, delta: u64) {
        self.cumulative_score = self.cumulative_score.saturating_add(delta);
        self.period_score = self.period_score.saturating_add(delta);
    }

    /// Archive the current period into history and start `next`
    ///
    /// `retention` caps the history length (0 keeps everything); the oldest
    /// entries are dropped first.
    pub fn close_period(&mut self, rank: Option<usize>, next: PeriodId, retention: usize) {
        self.history.push(PeriodResult {
            period_id: self.current_period_id,
            period_score: self.period_score,
            rank_in_instance: rank,
            tier_id: self.tier_id.clone(),
            instance_slot: self.instance_slot,
        });

        if retention > 0 && self.history.len() > retention {
            let excess = self.history.len() - retention;
            self.history.drain(..excess);
        }

        self.period_score = 0;
        self.current_period_id = next;
    }

    /// Aggregate stats over archived periods plus the open one
    pub fn stats(&self) -> ParticipantStats {
        let periods = self
            .history
            .iter()
            .map(|r| (r.period_id, r.period_score))
            .chain(std::iter::once((self.current_period_id, self.period_score)));

        let mut total: u128 = 0;
        let mut count: u64 = 0;
        let mut best: Option<BestPeriod> = None;

        for (period_id, score) in periods {
            total += u128::from(score);
            count += 1;
            // Earlier period keeps the title on ties
            if best.as_ref().map_or(true, |b| score > b.period_score) {
                best = Some(BestPeriod {
                    period_id,
                    period_score: score,
                });
            }
        }

        let average = if count == 0 {
            0
        } else {
            ((total as f64) / (count as f64)).round() as u64
        };

        ParticipantStats {
            average_period_score: average,
            best_period: best,
            periods_played: count as usize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPeriod {
    pub period_id: PeriodId,
    pub period_score: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub average_period_score: u64,
    pub best_period: Option<BestPeriod>,
    pub periods_played: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(s: &str) -> PeriodId {
        s.parse().unwrap()
    }

    fn record() -> ParticipantRecord {
        ParticipantRecord::new("p1", "Pat", None, 0, "bronze", 3, week("2026-W40"))
    }

    #[test]
    fn test_new_record_defaults() {
        let r = record();
        assert_eq!(r.instance_id, "bronze-3");
        assert_eq!(r.period_score, 0);
        assert_eq!(r.joined_period_id, r.current_period_id);
        assert!(r.rollover_generation.is_none());
        assert_eq!(r.version, 0);
    }

    #[test]
    fn test_place_updates_instance_id() {
        let mut r = record();
        r.place("silver", 0);
        assert_eq!(r.tier_id, "silver");
        assert_eq!(r.instance_id, "silver-0");
    }

    #[test]
    fn test_stale_score_counts_as_zero() {
        let mut r = record();
        r.add_score(120);
        assert_eq!(r.effective_period_score(week("2026-W40")), 120);
        assert_eq!(r.effective_period_score(week("2026-W41")), 0);
        assert!(!r.is_stale(week("2026-W40")));
        assert!(r.is_stale(week("2026-W41")));
    }

    #[test]
    fn test_add_score_saturates() {
        let mut r = record();
        r.cumulative_score = u64::MAX - 1;
        r.add_score(10);
        assert_eq!(r.cumulative_score, u64::MAX);
        assert_eq!(r.period_score, 10);
    }

    #[test]
    fn test_close_period_archives_and_resets() {
        let mut r = record();
        r.add_score(75);
        r.close_period(Some(4), week("2026-W41"), 0);

        assert_eq!(r.period_score, 0);
        assert_eq!(r.current_period_id, week("2026-W41"));
        assert_eq!(r.cumulative_score, 75);
        assert_eq!(
            r.history,
            vec![PeriodResult {
                period_id: week("2026-W40"),
                period_score: 75,
                rank_in_instance: Some(4),
                tier_id: "bronze".to_string(),
                instance_slot: 3,
            }]
        );
    }

    #[test]
    fn test_unsettled_standing_follows_lazy_close() {
        let mut r = record();
        r.add_score(60);
        let stale = r.unsettled_standing(week("2026-W41")).unwrap();
        assert_eq!(stale.period_id, week("2026-W40"));
        assert_eq!(stale.period_score, 60);
        assert!(r.unsettled_standing(week("2026-W40")).is_none());

        // Closed lazily, then active in the new period
        r.close_period(Some(2), week("2026-W41"), 0);
        r.add_score(15);
        let lazy = r.unsettled_standing(week("2026-W41")).unwrap();
        assert_eq!(lazy, stale);
        assert_eq!(lazy.cumulative_score, 60);
        assert_eq!(lazy.instance_slot, 3);

        r.rollover_generation = Some(week("2026-W40"));
        assert!(r.unsettled_standing(week("2026-W41")).is_none());
    }

    #[test]
    fn test_history_retention_drops_oldest() {
        let mut r = record();
        let mut period = week("2026-W40");
        for _ in 0..5 {
            period = period.next();
            r.close_period(None, period, 3);
        }
        assert_eq!(r.history.len(), 3);
        assert_eq!(r.history[0].period_id, week("2026-W42"));
    }

    #[test]
    fn test_stats_include_open_period() {
        let mut r = record();
        r.add_score(100);
        r.close_period(Some(1), week("2026-W41"), 0);
        r.add_score(300);
        r.close_period(Some(1), week("2026-W42"), 0);
        r.add_score(51);

        let stats = r.stats();
        assert_eq!(stats.periods_played, 3);
        assert_eq!(stats.average_period_score, 150); // 451 / 3 = 150.33
        assert_eq!(
            stats.best_period,
            Some(BestPeriod {
                period_id: week("2026-W41"),
                period_score: 300
            })
        );
    }

    #[test]
    fn test_period_result_without_rank_still_loads() {
        let json = r#"{"periodId":"2026-W40","periodScore":12,"tierId":"bronze"}"#;
        let result: PeriodResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.rank_in_instance, None);
        assert_eq!(result.instance_slot, 0);
    }

    #[test]
    fn test_json_is_camel_case() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["participantId"], "p1");
        assert_eq!(json["currentPeriodId"], "2026-W40");
        assert_eq!(json["instanceId"], "bronze-3");
    }
}
