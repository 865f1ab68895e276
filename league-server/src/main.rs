//! league-server - weekly competitive league service
//!
//! Serves the league HTTP API, runs the scheduled period rollover and keeps
//! the participant ledger in SQLite (or memory for throwaway runs).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use league_common::api::auth::load_shared_secret;
use league_common::config::{
    ensure_directory_exists, resolve_root_folder, CONFIG_FILE_NAME, ROOT_FOLDER_ENV,
};
use league_common::events::EventBus;
use league_common::time::SystemClock;
use league_server::config::{ServerConfig, StorageBackend};
use league_server::engine::LeagueEngine;
use league_server::store::{LeagueStore, MemoryStore, SqliteStore};
use league_server::{build_router, scheduler, AppState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for league-server
#[derive(Parser, Debug)]
#[command(name = "league-server")]
#[command(about = "Weekly competitive league service")]
#[command(version)]
struct Args {
    /// Root folder holding league.toml and the database
    #[arg(short, long, env = "LEAGUE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (default: <root>/league.toml)
    #[arg(short, long, env = "LEAGUE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides bind_addr
    #[arg(short, long, env = "LEAGUE_BIND_ADDR")]
    bind: Option<String>,

    /// Storage backend, overrides storage.backend
    #[arg(long, value_enum, env = "LEAGUE_BACKEND")]
    backend: Option<StorageBackend>,

    /// Do not run the rollover scheduler
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| root_folder.join(CONFIG_FILE_NAME));
    let mut config = ServerConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting league-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", root_folder.display());
    if config_path.exists() {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!("No configuration at {}, using defaults", config_path.display());
    }

    ensure_directory_exists(&root_folder).context("Failed to create root folder")?;

    let catalog = config.tier_catalog().context("Invalid tier catalog")?;
    info!(
        "League: {} tiers, capacity {}, promote top {}, demote bottom {}",
        catalog.len(),
        config.league.instance_capacity,
        config.league.promotion_cutoff,
        config.league.demotion_cutoff
    );

    let (store, shared_secret): (Arc<dyn LeagueStore>, i64) = match config.storage.backend {
        StorageBackend::Sqlite => {
            let db_path = root_folder.join(&config.storage.database_file);
            info!("Database path: {}", db_path.display());
            let pool = league_common::db::init_database(&db_path)
                .await
                .context("Failed to initialize database")?;
            let secret = load_shared_secret(&pool)
                .await
                .context("Failed to load shared secret")?;
            (Arc::new(SqliteStore::new(pool)), secret)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; the ledger is lost on exit");
            (Arc::new(MemoryStore::new()), config.auth.shared_secret)
        }
    };

    if shared_secret == 0 {
        info!("API authentication disabled (shared_secret = 0)");
    } else {
        info!("✓ Loaded shared secret for API authentication");
    }

    let engine = Arc::new(LeagueEngine::new(
        store,
        catalog,
        config.league.clone(),
        Arc::new(SystemClock),
        EventBus::new(256),
    ));
    info!("Current period: {}", engine.current_period());

    let cancel = CancellationToken::new();
    let scheduler_handle = if config.scheduler.enabled && !args.no_scheduler {
        Some(scheduler::spawn(
            Arc::clone(&engine),
            config.scheduler.clone(),
            cancel.clone(),
        ))
    } else {
        info!("Rollover scheduler disabled");
        None
    };

    let app = build_router(AppState::new(engine, shared_secret));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("league-server listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
