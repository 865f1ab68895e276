//! SQLite ledger backend tests

use chrono::{Duration, TimeZone, Utc};
use league_common::db::init::init_database;
use league_common::events::EventBus;
use league_common::time::ManualClock;
use league_common::Error;
use league_server::config::LeagueSettings;
use league_server::engine::{JoinRequest, LeagueEngine};
use league_server::ledger::ParticipantRecord;
use league_server::period::PeriodId;
use league_server::rollover::{plan_rollover, PeriodSnapshot, RolloverOutcome};
use league_server::store::{LeagueStore, SqliteStore};
use league_server::tiers::TierCatalog;
use std::sync::Arc;
use tempfile::TempDir;

fn week(s: &str) -> PeriodId {
    s.parse().unwrap()
}

async fn setup_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("league.db")).await.unwrap();
    (dir, SqliteStore::new(pool))
}

fn record(id: &str, cumulative: u64, period: &str) -> ParticipantRecord {
    ParticipantRecord::new(id, &format!("Player {}", id), None, cumulative, "bronze", 0, week(period))
}

#[tokio::test]
async fn test_insert_and_get_round_trip() {
    let (_dir, store) = setup_store().await;
    let mut rec = record("ana", 120, "2026-W42");
    rec.avatar_ref = Some("avatars/ana.png".to_string());
    rec.add_score(30);

    rec.version = store.save(&rec).await.unwrap();
    assert_eq!(rec.version, 1);

    let loaded = store.get("ana").await.unwrap().unwrap();
    assert_eq!(loaded, rec);
    assert!(store.get("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let (_dir, store) = setup_store().await;
    let mut rec = record("ana", 0, "2026-W42");
    rec.version = store.save(&rec).await.unwrap();

    let mut first = rec.clone();
    first.add_score(5);
    first.version = store.save(&first).await.unwrap();
    assert_eq!(first.version, 2);

    let mut second = rec.clone();
    second.add_score(7);
    let err = store.save(&second).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Duplicate insert
    let err = store.save(&record("ana", 0, "2026-W42")).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    assert_eq!(store.get("ana").await.unwrap().unwrap().period_score, 5);
}

#[tokio::test]
async fn test_history_survives_persistence() {
    let (_dir, store) = setup_store().await;
    let mut rec = record("ana", 0, "2026-W41");
    rec.add_score(80);
    rec.close_period(Some(3), week("2026-W42"), 0);
    rec.rollover_generation = Some(week("2026-W41"));
    store.save(&rec).await.unwrap();

    let loaded = store.get("ana").await.unwrap().unwrap();
    assert_eq!(loaded.history.len(), 1);
    assert_eq!(loaded.history[0].period_id, week("2026-W41"));
    assert_eq!(loaded.history[0].period_score, 80);
    assert_eq!(loaded.history[0].rank_in_instance, Some(3));
    assert_eq!(loaded.rollover_generation, Some(week("2026-W41")));
    assert_eq!(loaded.current_period_id, week("2026-W42"));
}

#[tokio::test]
async fn test_instance_queries() {
    let (_dir, store) = setup_store().await;
    for (id, slot, period) in [("a", 0, "2026-W42"), ("b", 0, "2026-W41"), ("c", 1, "2026-W42")] {
        let mut rec = record(id, 10, period);
        rec.place("bronze", slot);
        store.save(&rec).await.unwrap();
    }
    let mut gold = record("d", 5000, "2026-W42");
    gold.place("gold", 0);
    store.save(&gold).await.unwrap();

    let instance = store.list_instance("bronze", 0).await.unwrap();
    let mut ids: Vec<_> = instance.iter().map(|r| r.participant_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);

    let population = store.instance_population("bronze").await.unwrap();
    assert_eq!(population.get(&0), Some(&2));
    assert_eq!(population.get(&1), Some(&1));

    let unsettled = store.list_unsettled(week("2026-W42")).await.unwrap();
    assert_eq!(unsettled.len(), 1);
    assert_eq!(unsettled[0].participant_id, "b");

    assert_eq!(store.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_lazily_closed_records_stay_unsettled_until_stamped() {
    let (_dir, store) = setup_store().await;
    for id in ["lazy", "swept"] {
        let mut rec = record(id, 0, "2026-W41");
        rec.add_score(40);
        rec.close_period(Some(1), week("2026-W42"), 0);
        if id == "swept" {
            rec.rollover_generation = Some(week("2026-W41"));
        }
        store.save(&rec).await.unwrap();
    }
    store.save(&record("stale", 0, "2026-W41")).await.unwrap();
    store.save(&record("fresh", 0, "2026-W42")).await.unwrap();

    let unsettled = store.list_unsettled(week("2026-W42")).await.unwrap();
    let ids: Vec<_> = unsettled.iter().map(|r| r.participant_id.as_str()).collect();
    assert_eq!(ids, vec!["lazy", "stale"]);

    // Once the week after is current, every record is unsettled again
    let later = store.list_unsettled(week("2026-W43")).await.unwrap();
    assert_eq!(later.len(), 4);
}

#[tokio::test]
async fn test_top_by_cumulative_ignores_stale_period_scores() {
    let (_dir, store) = setup_store().await;
    let mut stale = record("a", 100, "2026-W41");
    stale.period_score = 90;
    store.save(&stale).await.unwrap();
    let mut live = record("b", 100, "2026-W42");
    live.period_score = 10;
    store.save(&live).await.unwrap();
    store.save(&record("c", 400, "2026-W42")).await.unwrap();

    let top = store.top_by_cumulative(10, week("2026-W42")).await.unwrap();
    let ids: Vec<_> = top.iter().map(|r| r.participant_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);

    assert_eq!(store.top_by_cumulative(1, week("2026-W42")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_journal_lifecycle() {
    let (_dir, store) = setup_store().await;
    assert!(store.load_journal().await.unwrap().is_none());

    let records = vec![record("a", 0, "2026-W41"), record("b", 0, "2026-W41")];
    let catalog = TierCatalog::default();
    let zones = LeagueSettings::default().zones();
    let now = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 5).unwrap();
    let journal = plan_rollover(&records, &catalog, &zones, week("2026-W42"), now).unwrap();

    store.save_journal(&journal).await.unwrap();
    assert_eq!(store.load_journal().await.unwrap(), Some(journal.clone()));

    // Overwrites the single journal row
    let mut progressed = journal.clone();
    progressed.entries[0].status = league_server::rollover::EntryStatus::Applied;
    store.save_journal(&progressed).await.unwrap();
    assert_eq!(store.load_journal().await.unwrap().unwrap().processed(), 1);

    store.clear_journal().await.unwrap();
    assert!(store.load_journal().await.unwrap().is_none());
}

#[tokio::test]
async fn test_snapshots_newest_first() {
    let (_dir, store) = setup_store().await;
    let at = Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 5).unwrap();

    for period in ["2026-W40", "2026-W41", "2026-W39"] {
        let records = vec![record("a", 0, period)];
        let journal = plan_rollover(
            &records,
            &TierCatalog::default(),
            &LeagueSettings::default().zones(),
            week(period).next(),
            at,
        )
        .unwrap();
        store
            .save_snapshot(&PeriodSnapshot::from_journal(&journal, 1, at))
            .await
            .unwrap();
    }

    let recent = store.recent_snapshots(2).await.unwrap();
    let periods: Vec<_> = recent.iter().map(|s| s.period_id.to_string()).collect();
    assert_eq!(periods, vec!["2026-W41", "2026-W40"]);

    let all = store.recent_snapshots(10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].period_id, week("2026-W39"));
    assert_eq!(all[2].rollover_timestamp, at);
}

#[tokio::test]
async fn test_engine_rollover_on_sqlite() {
    let (_dir, store) = setup_store().await;
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()));
    let engine = LeagueEngine::new(
        Arc::new(store),
        TierCatalog::default(),
        LeagueSettings::default(),
        clock.clone(),
        EventBus::new(16),
    );

    for (id, delta) in [("ana", 40), ("ben", 20)] {
        engine
            .join(JoinRequest {
                participant_id: id.to_string(),
                display_name: id.to_uppercase(),
                avatar_ref: None,
                cumulative_score: None,
            })
            .await
            .unwrap();
        engine.record_score(id, delta, None).await.unwrap();
    }

    clock.advance(Duration::days(7));
    let RolloverOutcome::Completed(snapshot) = engine.trigger_rollover().await.unwrap() else {
        panic!("expected a completed rollover");
    };
    assert_eq!(snapshot.processed, 2);
    assert!(engine.store().load_journal().await.unwrap().is_none());

    let ana = engine.store().get("ana").await.unwrap().unwrap();
    assert_eq!(ana.period_score, 0);
    assert_eq!(ana.history[0].rank_in_instance, Some(1));
    assert_eq!(ana.current_period_id, week("2026-W43"));

    assert!(matches!(
        engine.trigger_rollover().await.unwrap(),
        RolloverOutcome::UpToDate(Some(_))
    ));
}
