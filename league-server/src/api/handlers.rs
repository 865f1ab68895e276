//! League endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use league_common::Error;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::engine::{GlobalLeaderboard, JoinRequest, ParticipantView, RankingsView};
use crate::ledger::ParticipantRecord;
use crate::period::PeriodId;
use crate::rollover::{PeriodSnapshot, RolloverOutcome, TierTransition};
use crate::tiers::Tier;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub participant_record: ParticipantRecord,
    pub tier: Tier,
}

/// POST /leagues/join
pub async fn join(
    State(state): State<AppState>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<Json<JoinResponse>> {
    let Json(request) = payload?;
    let outcome = state.engine.join(request).await?;
    Ok(Json(JoinResponse {
        participant_record: outcome.record,
        tier: outcome.tier,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub participant_id: String,
    /// Signed so a negative value yields a clear 400 instead of a parse error
    pub delta: Option<i64>,
    #[serde(default)]
    pub activity_tag: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub participant_record: ParticipantRecord,
    pub rank: usize,
    pub delta: u64,
    pub activity_tag: Option<String>,
}

/// POST /leagues/score
pub async fn record_score(
    State(state): State<AppState>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> ApiResult<Json<ScoreResponse>> {
    let Json(request) = payload?;

    let delta = match request.delta {
        None => return Err(Error::InvalidInput("delta is required".to_string()).into()),
        Some(d) if d < 0 => {
            return Err(Error::InvalidInput(format!("delta must not be negative (got {})", d)).into())
        }
        Some(d) => d as u64,
    };

    let outcome = state
        .engine
        .record_score(&request.participant_id, delta, request.activity_tag.clone())
        .await?;

    Ok(Json(ScoreResponse {
        participant_record: outcome.record,
        rank: outcome.rank,
        delta,
        activity_tag: request.activity_tag,
    }))
}

/// GET /leagues/rankings/:participant_id
pub async fn rankings(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<RankingsView>> {
    Ok(Json(state.engine.rankings_for(&participant_id).await?))
}

/// GET /leagues/user/:participant_id
pub async fn participant(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<ParticipantView>> {
    Ok(Json(state.engine.participant_view(&participant_id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloverResponse {
    /// `completed` or `up_to_date`
    pub status: &'static str,
    pub period_id: Option<PeriodId>,
    pub next_period_id: Option<PeriodId>,
    pub promotions: Vec<TierTransition>,
    pub demotions: Vec<TierTransition>,
    pub total_participants: usize,
    pub processed: usize,
}

impl RolloverResponse {
    fn from_snapshot(status: &'static str, snapshot: PeriodSnapshot) -> Self {
        Self {
            status,
            period_id: Some(snapshot.period_id),
            next_period_id: Some(snapshot.next_period_id),
            promotions: snapshot.promotions,
            demotions: snapshot.demotions,
            total_participants: snapshot.total_participants,
            processed: snapshot.processed,
        }
    }
}

/// POST /leagues/rollover (authenticated)
///
/// Idempotent per period: a second call returns `up_to_date` with the last
/// snapshot.
pub async fn rollover(State(state): State<AppState>) -> ApiResult<Json<RolloverResponse>> {
    info!("Rollover requested via API");
    let response = match state.engine.trigger_rollover().await? {
        RolloverOutcome::Completed(snapshot) => RolloverResponse::from_snapshot("completed", snapshot),
        RolloverOutcome::UpToDate(Some(snapshot)) => {
            RolloverResponse::from_snapshot("up_to_date", snapshot)
        }
        RolloverOutcome::UpToDate(None) => RolloverResponse {
            status: "up_to_date",
            period_id: None,
            next_period_id: None,
            promotions: Vec::new(),
            demotions: Vec::new(),
            total_participants: state.engine.store().count().await?,
            processed: 0,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// GET /leagues/leaderboard/global?limit=N
pub async fn global_leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<GlobalLeaderboard>> {
    let Query(query) = query.map_err(ApiError::from)?;
    Ok(Json(state.engine.global_leaderboard(query.limit).await?))
}

#[derive(Debug, Serialize)]
pub struct SnapshotsResponse {
    pub snapshots: Vec<PeriodSnapshot>,
}

/// GET /leagues/snapshots?limit=N
pub async fn snapshots(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Json<SnapshotsResponse>> {
    let Query(query) = query.map_err(ApiError::from)?;
    Ok(Json(SnapshotsResponse {
        snapshots: state.engine.snapshots(query.limit).await?,
    }))
}
