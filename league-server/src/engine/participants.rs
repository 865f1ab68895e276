//! Participant lifecycle - join and score recording

use super::core::LeagueEngine;
use crate::ledger::ParticipantRecord;
use crate::tiers::Tier;
use league_common::events::LeagueEvent;
use league_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub participant_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_ref: Option<String>,
    #[serde(default)]
    pub cumulative_score: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub record: ParticipantRecord,
    pub tier: Tier,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub record: ParticipantRecord,
    /// Rank in the instance after the update
    pub rank: usize,
}

fn require_non_blank(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(())
}

impl LeagueEngine {
    /// Create or refresh a participant
    ///
    /// Existing records from an older period are archived first. The supplied
    /// cumulative score overwrites the stored one unless
    /// `trust_client_cumulative_score` is off, in which case it only seeds new
    /// records. An absent `avatar_ref` keeps the stored one.
    pub async fn join(&self, request: JoinRequest) -> Result<JoinOutcome> {
        require_non_blank(&request.participant_id, "participantId")?;
        require_non_blank(&request.display_name, "displayName")?;

        let _guard = self.locks.lock(&request.participant_id).await;
        let current = self.current_period();

        let (record, created) = match self.store.get(&request.participant_id).await? {
            None => {
                let score = request.cumulative_score.unwrap_or(0);
                let tier_id = self.catalog.tier_for_score(score).id.clone();
                let mut record = ParticipantRecord::new(
                    &request.participant_id,
                    &request.display_name,
                    request.avatar_ref,
                    score,
                    &tier_id,
                    0,
                    current,
                );
                self.save_in_tier(&mut record, &tier_id).await?;

                info!(
                    "Participant {} joined {} in {}",
                    record.participant_id, record.instance_id, current
                );
                self.events.emit_lossy(LeagueEvent::ParticipantJoined {
                    participant_id: record.participant_id.clone(),
                    tier_id: record.tier_id.clone(),
                    instance_id: record.instance_id.clone(),
                    timestamp: self.clock.now(),
                });
                (record, true)
            }
            Some(mut record) => {
                self.close_stale_period(&mut record, current).await?;

                record.display_name = request.display_name;
                if request.avatar_ref.is_some() {
                    record.avatar_ref = request.avatar_ref;
                }
                let previous_score = record.cumulative_score;
                if self.settings.trust_client_cumulative_score {
                    if let Some(score) = request.cumulative_score {
                        record.cumulative_score = score;
                    }
                }

                let tier_id = self.score_tier(&record, previous_score);
                let previous = self.save_in_tier(&mut record, &tier_id).await?;
                self.announce_tier_change(&record, previous);

                debug!("Participant {} rejoined", record.participant_id);
                (record, false)
            }
        };

        let tier = self.tier_of(&record);
        Ok(JoinOutcome {
            record,
            tier,
            created,
        })
    }

    /// Add `delta` to both scores of an existing participant
    pub async fn record_score(
        &self,
        participant_id: &str,
        delta: u64,
        activity_tag: Option<String>,
    ) -> Result<ScoreOutcome> {
        let _guard = self.locks.lock(participant_id).await;
        let current = self.current_period();

        let mut record = self.load(participant_id).await?;
        self.close_stale_period(&mut record, current).await?;
        let previous_score = record.cumulative_score;
        record.add_score(delta);

        let tier_id = self.score_tier(&record, previous_score);
        let previous = self.save_in_tier(&mut record, &tier_id).await?;
        self.announce_tier_change(&record, previous);

        let (_, rank) = self.rank_in_instance(&record, current).await?;

        debug!(
            "Recorded {} for {} (period {}, rank {})",
            delta, participant_id, record.period_score, rank
        );
        self.events.emit_lossy(LeagueEvent::ScoreRecorded {
            participant_id: record.participant_id.clone(),
            delta,
            period_score: record.period_score,
            cumulative_score: record.cumulative_score,
            rank,
            activity_tag,
            timestamp: self.clock.now(),
        });

        Ok(ScoreOutcome { record, rank })
    }

    /// Tier after a cumulative score change from `previous_score`
    ///
    /// Only a change that crosses a catalog threshold moves the participant,
    /// and only in the direction of the change: a rise never lands below the
    /// current tier and a drop never above it. A rollover promotion or
    /// demotion is therefore not undone by the next score update.
    fn score_tier(&self, record: &ParticipantRecord, previous_score: u64) -> String {
        let before = self.catalog.tier_for_score(previous_score);
        let after = self.catalog.tier_for_score(record.cumulative_score);
        if before.id == after.id {
            return record.tier_id.clone();
        }

        let current_rank = self.tier_of(record).rank;
        let moves = if record.cumulative_score > previous_score {
            after.rank > current_rank
        } else {
            after.rank < current_rank
        };
        if moves {
            after.id.clone()
        } else {
            record.tier_id.clone()
        }
    }

    fn announce_tier_change(&self, record: &ParticipantRecord, previous: Option<String>) {
        if let Some(from_tier) = previous {
            info!(
                "Participant {} moved {} -> {} ({})",
                record.participant_id, from_tier, record.tier_id, record.instance_id
            );
            self.events.emit_lossy(LeagueEvent::TierChanged {
                participant_id: record.participant_id.clone(),
                from_tier,
                to_tier: record.tier_id.clone(),
                instance_id: record.instance_id.clone(),
                timestamp: self.clock.now(),
            });
        }
    }

    /// Catalog entry for the record's tier, or the score-derived tier when a
    /// catalog change removed it
    pub(super) fn tier_of(&self, record: &ParticipantRecord) -> Tier {
        self.catalog
            .get(&record.tier_id)
            .unwrap_or_else(|| self.catalog.tier_for_score(record.cumulative_score))
            .clone()
    }
}
