//! Read-only views over the ledger
//!
//! Views never write, so a participant whose period has closed is shown with
//! a period score of 0 until their next write or the bulk rollover.

use super::core::LeagueEngine;
use super::{DEFAULT_GLOBAL_LIMIT, DEFAULT_SNAPSHOT_LIMIT, MAX_GLOBAL_LIMIT, MAX_SNAPSHOT_LIMIT};
use crate::ledger::{ParticipantRecord, ParticipantStats};
use crate::period::PeriodId;
use crate::ranking::{global_leaderboard, truncate_for_display, GlobalEntry, RankedEntry, Zone};
use crate::rollover::PeriodSnapshot;
use crate::tiers::Tier;
use chrono::{DateTime, Utc};
use league_common::time::unix_millis;
use league_common::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsView {
    pub tier: Tier,
    pub instance_id: String,
    pub rankings: Vec<RankedEntry>,
    pub user_rank: usize,
    pub current_period: PeriodId,
    pub period_ends_at: DateTime<Utc>,
    pub period_ends_in_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub participant_record: ParticipantRecord,
    pub tier: Tier,
    pub rank: usize,
    pub promotion_zone: bool,
    pub demotion_zone: bool,
    pub can_promote: bool,
    pub can_demote: bool,
    pub next_tier: Option<Tier>,
    pub previous_tier: Option<Tier>,
    pub stats: ParticipantStats,
    pub current_period: PeriodId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLeaderboard {
    pub leaderboard: Vec<GlobalEntry>,
    pub total_participants: usize,
}

/// Resolve an optional `limit` query value against a default and ceiling
fn resolve_limit(limit: Option<usize>, default: usize, max: usize) -> Result<usize> {
    match limit {
        Some(0) => Err(Error::InvalidInput("limit must be at least 1".to_string())),
        Some(n) => Ok(n.min(max)),
        None => Ok(default),
    }
}

impl LeagueEngine {
    /// Instance leaderboard for the participant's current instance
    pub async fn rankings_for(&self, participant_id: &str) -> Result<RankingsView> {
        let record = self.load(participant_id).await?;
        let now = self.clock.now();
        let current = PeriodId::containing(now);

        let (ranked, user_rank) = self.rank_in_instance(&record, current).await?;
        let ends_at = current.ends_at();

        Ok(RankingsView {
            tier: self.tier_of(&record),
            instance_id: record.instance_id,
            rankings: truncate_for_display(ranked, self.settings.instance_capacity),
            user_rank,
            current_period: current,
            period_ends_at: ends_at,
            period_ends_in_ms: (unix_millis(ends_at) - unix_millis(now)).max(0),
        })
    }

    /// Record, tier, zone flags and history stats for one participant
    pub async fn participant_view(&self, participant_id: &str) -> Result<ParticipantView> {
        let record = self.load(participant_id).await?;
        let current = self.current_period();
        let (_, rank) = self.rank_in_instance(&record, current).await?;

        let tier = self.tier_of(&record);
        let next_tier = self.catalog.next_tier(&tier.id).cloned();
        let previous_tier = self.catalog.previous_tier(&tier.id).cloned();
        let zone = self.settings.zones().classify(rank);
        let promotion_zone = zone == Zone::Promotion;
        let demotion_zone = zone == Zone::Demotion;

        Ok(ParticipantView {
            stats: record.stats(),
            can_promote: promotion_zone && next_tier.is_some(),
            can_demote: demotion_zone && previous_tier.is_some(),
            participant_record: record,
            tier,
            rank,
            promotion_zone,
            demotion_zone,
            next_tier,
            previous_tier,
            current_period: current,
        })
    }

    /// All participants by cumulative score
    ///
    /// `limit` defaults to 100 and is capped at 1000; 0 is rejected.
    pub async fn global_leaderboard(&self, limit: Option<usize>) -> Result<GlobalLeaderboard> {
        let limit = resolve_limit(limit, DEFAULT_GLOBAL_LIMIT, MAX_GLOBAL_LIMIT)?;
        let current = self.current_period();

        let top = self.store.top_by_cumulative(limit, current).await?;
        let total_participants = self.store.count().await?;

        Ok(GlobalLeaderboard {
            leaderboard: global_leaderboard(top, current),
            total_participants,
        })
    }

    /// Most recent rollover snapshots, newest first
    pub async fn snapshots(&self, limit: Option<usize>) -> Result<Vec<PeriodSnapshot>> {
        let limit = resolve_limit(limit, DEFAULT_SNAPSHOT_LIMIT, MAX_SNAPSHOT_LIMIT)?;
        self.store.recent_snapshots(limit).await
    }
}
