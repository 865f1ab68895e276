//! Ranking engine
//!
//! Pure ordering over ledger records. Callers pass one point-in-time read from
//! the store; nothing here touches storage or locks.

use crate::ledger::{ClosedStanding, ParticipantRecord};
use crate::period::PeriodId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of an instance leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub participant_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub period_score: u64,
    pub cumulative_score: u64,
    /// 1-based
    pub rank: usize,
}

/// Instance order: period score desc, cumulative desc, participant id asc
fn instance_order(a: (u64, &ParticipantRecord), b: (u64, &ParticipantRecord)) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| b.1.cumulative_score.cmp(&a.1.cumulative_score))
        .then_with(|| a.1.participant_id.cmp(&b.1.participant_id))
}

/// Rank every record of one instance as seen from `current`
///
/// Records from an older period rank with a period score of 0. The result is
/// untruncated; see [`truncate_for_display`].
pub fn rank_instance(records: &[ParticipantRecord], current: PeriodId) -> Vec<RankedEntry> {
    let mut scored: Vec<(u64, &ParticipantRecord)> = records
        .iter()
        .map(|r| (r.effective_period_score(current), r))
        .collect();
    scored.sort_by(|a, b| instance_order(*a, *b));

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, r))| RankedEntry {
            participant_id: r.participant_id.clone(),
            display_name: r.display_name.clone(),
            avatar_ref: r.avatar_ref.clone(),
            period_score: score,
            cumulative_score: r.cumulative_score,
            rank: i + 1,
        })
        .collect()
}

/// Rank standings that all belong to the same closed period and instance
///
/// Same order as a live instance, over the scores the period closed with.
/// Returns `(standing, rank)` pairs in rank order.
pub fn rank_closed_period<'a, I>(standings: I) -> Vec<(&'a ClosedStanding, usize)>
where
    I: IntoIterator<Item = &'a ClosedStanding>,
{
    let mut ordered: Vec<&ClosedStanding> = standings.into_iter().collect();
    ordered.sort_by(|a, b| {
        b.period_score
            .cmp(&a.period_score)
            .then_with(|| b.cumulative_score.cmp(&a.cumulative_score))
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, s)| (s, i + 1))
        .collect()
}

/// Rank of `participant_id` in an untruncated ranking
pub fn rank_of(entries: &[RankedEntry], participant_id: &str) -> Option<usize> {
    entries
        .iter()
        .find(|e| e.participant_id == participant_id)
        .map(|e| e.rank)
}

pub fn truncate_for_display(mut entries: Vec<RankedEntry>, capacity: usize) -> Vec<RankedEntry> {
    entries.truncate(capacity);
    entries
}

/// Zone a rank falls in at period close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Promotion,
    Demotion,
    Safe,
}

/// Promotion/demotion cutoffs for an instance of capacity `N`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zones {
    pub capacity: usize,
    pub promotion_cutoff: usize,
    pub demotion_cutoff: usize,
}

impl Zones {
    /// Promotion if `rank <= P`, else demotion if `rank > N - D`
    pub fn classify(&self, rank: usize) -> Zone {
        if rank >= 1 && rank <= self.promotion_cutoff {
            Zone::Promotion
        } else if self.demotion_cutoff > 0
            && rank > self.capacity.saturating_sub(self.demotion_cutoff)
        {
            Zone::Demotion
        } else {
            Zone::Safe
        }
    }
}

/// One row of the global leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEntry {
    pub rank: usize,
    pub participant_id: String,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub tier_id: String,
    pub cumulative_score: u64,
    pub period_score: u64,
}

/// Global order: cumulative desc, effective period score desc, participant id asc
pub fn global_order(a: &ParticipantRecord, b: &ParticipantRecord, current: PeriodId) -> Ordering {
    b.cumulative_score
        .cmp(&a.cumulative_score)
        .then_with(|| {
            b.effective_period_score(current)
                .cmp(&a.effective_period_score(current))
        })
        .then_with(|| a.participant_id.cmp(&b.participant_id))
}

/// Number records already in global order
pub fn global_leaderboard(records: Vec<ParticipantRecord>, current: PeriodId) -> Vec<GlobalEntry> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, r)| GlobalEntry {
            rank: i + 1,
            period_score: r.effective_period_score(current),
            participant_id: r.participant_id,
            display_name: r.display_name,
            avatar_ref: r.avatar_ref,
            tier_id: r.tier_id,
            cumulative_score: r.cumulative_score,
        })
        .collect()
}
