//! SQLite ledger backend
//!
//! Schema is created by `league_common::db::init_database`. History, snapshot
//! transitions and the journal plan are JSON text columns.

use super::{version_conflict, LeagueStore};
use crate::ledger::ParticipantRecord;
use crate::partition::InstancePopulation;
use crate::period::PeriodId;
use crate::rollover::{PeriodSnapshot, RolloverJournal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use league_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

const RECORD_COLUMNS: &str = "participant_id, display_name, avatar_ref, cumulative_score, \
     period_score, tier_id, instance_slot, current_period_id, joined_period_id, \
     rollover_generation, history, version";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_period(value: &str) -> Result<PeriodId> {
    value
        .parse()
        .map_err(|e| Error::Internal(format!("corrupt period id in database: {}", e)))
}

/// Scores are u64 in the engine and INTEGER (i64) in SQLite
fn to_db_score(score: u64) -> i64 {
    i64::try_from(score).unwrap_or(i64::MAX)
}

fn from_db_score(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn row_to_record(row: &SqliteRow) -> Result<ParticipantRecord> {
    let tier_id: String = row.try_get("tier_id")?;
    let slot: i64 = row.try_get("instance_slot")?;
    let slot = u32::try_from(slot)
        .map_err(|_| Error::Internal(format!("instance slot {} out of range", slot)))?;
    let current: String = row.try_get("current_period_id")?;
    let joined: String = row.try_get("joined_period_id")?;
    let generation: Option<String> = row.try_get("rollover_generation")?;
    let history: String = row.try_get("history")?;

    Ok(ParticipantRecord {
        participant_id: row.try_get("participant_id")?,
        display_name: row.try_get("display_name")?,
        avatar_ref: row.try_get("avatar_ref")?,
        cumulative_score: from_db_score(row.try_get("cumulative_score")?),
        period_score: from_db_score(row.try_get("period_score")?),
        instance_id: crate::partition::instance_id(&tier_id, slot),
        tier_id,
        instance_slot: slot,
        current_period_id: parse_period(&current)?,
        joined_period_id: parse_period(&joined)?,
        rollover_generation: generation.as_deref().map(parse_period).transpose()?,
        history: serde_json::from_str(&history)?,
        version: row.try_get("version")?,
    })
}

fn row_to_snapshot(row: &SqliteRow) -> Result<PeriodSnapshot> {
    let snapshot_id: String = row.try_get("snapshot_id")?;
    let period_id: String = row.try_get("period_id")?;
    let next_period_id: String = row.try_get("next_period_id")?;
    let rollover_at: String = row.try_get("rollover_at")?;
    let promotions: String = row.try_get("promotions")?;
    let demotions: String = row.try_get("demotions")?;
    let total: i64 = row.try_get("total_participants")?;
    let processed: i64 = row.try_get("processed")?;

    Ok(PeriodSnapshot {
        snapshot_id: snapshot_id
            .parse()
            .map_err(|e| Error::Internal(format!("corrupt snapshot id: {}", e)))?,
        period_id: parse_period(&period_id)?,
        next_period_id: parse_period(&next_period_id)?,
        rollover_timestamp: DateTime::parse_from_rfc3339(&rollover_at)
            .map_err(|e| Error::Internal(format!("corrupt rollover timestamp: {}", e)))?
            .with_timezone(&Utc),
        promotions: serde_json::from_str(&promotions)?,
        demotions: serde_json::from_str(&demotions)?,
        total_participants: usize::try_from(total).unwrap_or(0),
        processed: usize::try_from(processed).unwrap_or(0),
    })
}

impl SqliteStore {
    async fn insert(&self, record: &ParticipantRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO participants (
                participant_id, display_name, avatar_ref, cumulative_score, period_score,
                tier_id, instance_slot, current_period_id, joined_period_id,
                rollover_generation, history, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(&record.participant_id)
        .bind(&record.display_name)
        .bind(&record.avatar_ref)
        .bind(to_db_score(record.cumulative_score))
        .bind(to_db_score(record.period_score))
        .bind(&record.tier_id)
        .bind(i64::from(record.instance_slot))
        .bind(record.current_period_id.to_string())
        .bind(record.joined_period_id.to_string())
        .bind(record.rollover_generation.map(|p| p.to_string()))
        .bind(serde_json::to_string(&record.history)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(1),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(version_conflict(&record.participant_id, 0, None))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, record: &ParticipantRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            UPDATE participants SET
                display_name = ?, avatar_ref = ?, cumulative_score = ?, period_score = ?,
                tier_id = ?, instance_slot = ?, current_period_id = ?, joined_period_id = ?,
                rollover_generation = ?, history = ?,
                version = version + 1, updated_at = CURRENT_TIMESTAMP
            WHERE participant_id = ? AND version = ?
            "#,
        )
        .bind(&record.display_name)
        .bind(&record.avatar_ref)
        .bind(to_db_score(record.cumulative_score))
        .bind(to_db_score(record.period_score))
        .bind(&record.tier_id)
        .bind(i64::from(record.instance_slot))
        .bind(record.current_period_id.to_string())
        .bind(record.joined_period_id.to_string())
        .bind(record.rollover_generation.map(|p| p.to_string()))
        .bind(serde_json::to_string(&record.history)?)
        .bind(&record.participant_id)
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT version FROM participants WHERE participant_id = ?")
                    .bind(&record.participant_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(version_conflict(&record.participant_id, record.version, found));
        }

        Ok(record.version + 1)
    }
}

#[async_trait]
impl LeagueStore for SqliteStore {
    async fn get(&self, participant_id: &str) -> Result<Option<ParticipantRecord>> {
        let sql = format!("SELECT {} FROM participants WHERE participant_id = ?", RECORD_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(participant_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn save(&self, record: &ParticipantRecord) -> Result<i64> {
        if record.version == 0 {
            self.insert(record).await
        } else {
            self.update(record).await
        }
    }

    async fn list_instance(&self, tier_id: &str, slot: u32) -> Result<Vec<ParticipantRecord>> {
        let sql = format!(
            "SELECT {} FROM participants WHERE tier_id = ? AND instance_slot = ?",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(tier_id)
            .bind(i64::from(slot))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn list_unsettled(&self, current: PeriodId) -> Result<Vec<ParticipantRecord>> {
        // YYYY-Www strings sort in period order; the newest history entry of a
        // lazily closed record has not reached rollover_generation yet
        let sql = format!(
            "SELECT {} FROM participants \
             WHERE current_period_id < ? \
                OR json_extract(history, '$[#-1].periodId') IS NOT rollover_generation \
             ORDER BY participant_id",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(current.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut unsettled = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row_to_record(row)?;
            if record.unsettled_standing(current).is_some() {
                unsettled.push(record);
            }
        }
        debug!("{} unsettled participants before {}", unsettled.len(), current);
        Ok(unsettled)
    }

    async fn instance_population(&self, tier_id: &str) -> Result<InstancePopulation> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT instance_slot, COUNT(*) FROM participants WHERE tier_id = ? GROUP BY instance_slot",
        )
        .bind(tier_id)
        .fetch_all(&self.pool)
        .await?;

        let mut population = InstancePopulation::new();
        for (slot, count) in rows {
            if let Ok(slot) = u32::try_from(slot) {
                population.insert(slot, usize::try_from(count).unwrap_or(0));
            }
        }
        Ok(population)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn top_by_cumulative(&self, limit: usize, current: PeriodId) -> Result<Vec<ParticipantRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM participants
            ORDER BY cumulative_score DESC,
                     CASE WHEN current_period_id < ? THEN 0 ELSE period_score END DESC,
                     participant_id ASC
            LIMIT ?
            "#,
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(current.to_string())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn save_snapshot(&self, snapshot: &PeriodSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO period_snapshots (
                snapshot_id, period_id, next_period_id, rollover_at,
                total_participants, processed, promotions, demotions
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(period_id) DO UPDATE SET
                snapshot_id = excluded.snapshot_id,
                next_period_id = excluded.next_period_id,
                rollover_at = excluded.rollover_at,
                total_participants = excluded.total_participants,
                processed = excluded.processed,
                promotions = excluded.promotions,
                demotions = excluded.demotions
            "#,
        )
        .bind(snapshot.snapshot_id.to_string())
        .bind(snapshot.period_id.to_string())
        .bind(snapshot.next_period_id.to_string())
        .bind(snapshot.rollover_timestamp.to_rfc3339())
        .bind(i64::try_from(snapshot.total_participants).unwrap_or(i64::MAX))
        .bind(i64::try_from(snapshot.processed).unwrap_or(i64::MAX))
        .bind(serde_json::to_string(&snapshot.promotions)?)
        .bind(serde_json::to_string(&snapshot.demotions)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_snapshots(&self, limit: usize) -> Result<Vec<PeriodSnapshot>> {
        let rows = sqlx::query("SELECT * FROM period_snapshots ORDER BY period_id DESC LIMIT ?")
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_snapshot).collect()
    }

    async fn load_journal(&self) -> Result<Option<RolloverJournal>> {
        let plan: Option<String> = sqlx::query_scalar("SELECT plan FROM rollover_journal WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match plan {
            Some(plan) => Ok(Some(serde_json::from_str(&plan)?)),
            None => Ok(None),
        }
    }

    async fn save_journal(&self, journal: &RolloverJournal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rollover_journal (id, period_id, plan) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET period_id = excluded.period_id, plan = excluded.plan
            "#,
        )
        .bind(journal.period_id.to_string())
        .bind(serde_json::to_string(journal)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_journal(&self) -> Result<()> {
        sqlx::query("DELETE FROM rollover_journal WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
