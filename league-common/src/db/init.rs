//! Database initialization
//!
//! Opens (creating if needed) the league SQLite database and brings the schema
//! up to date. Every statement is idempotent so startup can run it each time.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Default SQLite busy timeout applied after the schema is in place
const DEFAULT_BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL keeps ranking reads from blocking on score writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_busy_timeout_ms'",
    )
    .fetch_optional(&pool)
    .await?
    .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

    let pragma_sql = format!("PRAGMA busy_timeout = {}", timeout_ms);
    sqlx::query(&pragma_sql).execute(&pool).await?;

    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Create every league table on an already-open pool
///
/// Split out from [`init_database`] so tests can run it against
/// `sqlite::memory:` pools.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_participants_table(pool).await?;
    create_period_snapshots_table(pool).await?;
    create_rollover_journal_table(pool).await?;

    ensure_setting(pool, "database_busy_timeout_ms", &DEFAULT_BUSY_TIMEOUT_MS.to_string()).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_participants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            participant_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            avatar_ref TEXT,
            cumulative_score INTEGER NOT NULL DEFAULT 0 CHECK (cumulative_score >= 0),
            period_score INTEGER NOT NULL DEFAULT 0 CHECK (period_score >= 0),
            tier_id TEXT NOT NULL,
            instance_slot INTEGER NOT NULL,
            current_period_id TEXT NOT NULL,
            joined_period_id TEXT NOT NULL,
            rollover_generation TEXT,
            history TEXT NOT NULL DEFAULT '[]',
            version INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_participants_instance ON participants(tier_id, instance_slot)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_participants_cumulative ON participants(cumulative_score DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_period_snapshots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS period_snapshots (
            snapshot_id TEXT PRIMARY KEY,
            period_id TEXT NOT NULL UNIQUE,
            next_period_id TEXT NOT NULL,
            rollover_at TEXT NOT NULL,
            total_participants INTEGER NOT NULL,
            processed INTEGER NOT NULL,
            promotions TEXT NOT NULL DEFAULT '[]',
            demotions TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Single-row table holding the plan of an unfinished bulk rollover
async fn create_rollover_journal_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rollover_journal (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            period_id TEXT NOT NULL,
            plan TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a setting if it is missing or NULL, leaving existing values untouched
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        WHERE settings.value IS NULL
        "#,
    )
    .bind(key)
    .bind(default_value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = memory_pool().await;
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in ["participants", "period_snapshots", "rollover_journal", "settings"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_ensure_setting_does_not_overwrite() {
        let pool = memory_pool().await;
        create_settings_table(&pool).await.unwrap();

        ensure_setting(&pool, "k", "first").await.unwrap();
        ensure_setting(&pool, "k", "second").await.unwrap();

        let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'k'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(value, "first");
    }

    #[tokio::test]
    async fn test_ensure_setting_replaces_null() {
        let pool = memory_pool().await;
        create_settings_table(&pool).await.unwrap();

        sqlx::query("INSERT INTO settings (key, value) VALUES ('k', NULL)")
            .execute(&pool)
            .await
            .unwrap();
        ensure_setting(&pool, "k", "default").await.unwrap();

        let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'k'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(value, "default");
    }
}
