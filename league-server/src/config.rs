//! Configuration for league-server
//!
//! Loaded from `league.toml` in the root folder (or `--config`). Every field
//! has a built-in default, so a missing file or a partial file is valid.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--bind`, `--backend`)
//! 2. Environment variables (`LEAGUE_BIND_ADDR`, `LEAGUE_BACKEND`, `LEAGUE_ROOT_FOLDER`)
//! 3. `league.toml`
//! 4. Built-in defaults

use crate::partition::{PartitionStrategy, Partitioner};
use crate::ranking::Zones;
use crate::tiers::{default_tier_definitions, TierCatalog, TierDefinition};
use league_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub league: LeagueSettings,
    pub tiers: Vec<TierDefinition>,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5780".to_string(),
            league: LeagueSettings::default(),
            tiers: default_tier_definitions(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Engine tuning (`[league]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueSettings {
    /// Maximum participants per instance (N)
    pub instance_capacity: usize,
    /// Ranks `1..=promotion_cutoff` promote
    pub promotion_cutoff: usize,
    /// Ranks above `instance_capacity - demotion_cutoff` demote
    pub demotion_cutoff: usize,
    /// Slot count for the hashed strategy (M)
    pub instances_per_tier: u32,
    pub partition_strategy: PartitionStrategy,
    /// Archived periods kept per participant, 0 = unbounded
    pub history_retention: usize,
    /// Overwrite cumulative score with the client value on every join
    pub trust_client_cumulative_score: bool,
    pub lock_shards: usize,
    /// Journal entries applied between progress saves
    pub rollover_shard_size: usize,
}

impl Default for LeagueSettings {
    fn default() -> Self {
        Self {
            instance_capacity: 50,
            promotion_cutoff: 10,
            demotion_cutoff: 10,
            instances_per_tier: 100,
            partition_strategy: PartitionStrategy::LeastLoaded,
            history_retention: 0,
            trust_client_cumulative_score: true,
            lock_shards: 64,
            rollover_shard_size: 500,
        }
    }
}

impl LeagueSettings {
    pub fn zones(&self) -> Zones {
        Zones {
            capacity: self.instance_capacity,
            promotion_cutoff: self.promotion_cutoff,
            demotion_cutoff: self.demotion_cutoff,
        }
    }

    pub fn partitioner(&self) -> Partitioner {
        Partitioner::new(
            self.partition_strategy,
            self.instances_per_tier,
            self.instance_capacity,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance_capacity == 0 {
            return Err(Error::Config("league.instance_capacity must be at least 1".into()));
        }
        if self.instances_per_tier == 0 {
            return Err(Error::Config("league.instances_per_tier must be at least 1".into()));
        }
        if self.promotion_cutoff > self.instance_capacity {
            return Err(Error::Config(format!(
                "league.promotion_cutoff {} exceeds instance_capacity {}",
                self.promotion_cutoff, self.instance_capacity
            )));
        }
        if self.demotion_cutoff > self.instance_capacity {
            return Err(Error::Config(format!(
                "league.demotion_cutoff {} exceeds instance_capacity {}",
                self.demotion_cutoff, self.instance_capacity
            )));
        }
        if self.lock_shards == 0 || self.rollover_shard_size == 0 {
            return Err(Error::Config(
                "league.lock_shards and league.rollover_shard_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Relative paths resolve against the root folder
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_file: "league.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Delay after the period boundary before the sweep starts
    pub grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 3600,
            grace_secs: 5,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Only read by the memory backend; SQLite keeps its secret in `settings`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub shared_secret: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = league_common::config::load_toml_file::<ServerConfig>(path)?.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ServerConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid league config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.league.validate()?;
        self.tier_catalog().map(|_| ())
    }

    pub fn tier_catalog(&self) -> Result<TierCatalog> {
        TierCatalog::new(self.tiers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.league.instance_capacity, 50);
        assert_eq!(config.league.partition_strategy, PartitionStrategy::LeastLoaded);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.tier_catalog().unwrap().len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"

            [league]
            instance_capacity = 30
            partition_strategy = "hashed"

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.league.instance_capacity, 30);
        assert_eq!(config.league.promotion_cutoff, 10);
        assert_eq!(config.league.partition_strategy, PartitionStrategy::Hashed);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.database_file, "league.db");
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn test_custom_tiers() {
        let config = ServerConfig::from_toml_str(
            r#"
            [[tiers]]
            id = "bronze"
            name = "Bronze"
            min_score = 0

            [[tiers]]
            id = "silver"
            name = "Silver"
            min_score = 500
            color = "silver"
            "#,
        )
        .unwrap();
        let catalog = config.tier_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.highest().id, "silver");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServerConfig::from_toml_str("[league]\ninstance_capacity = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = ServerConfig::from_toml_str("[league]\npromotion_cutoff = 51\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let unordered = r#"
            [[tiers]]
            id = "a"
            name = "A"
            min_score = 10
            [[tiers]]
            id = "b"
            name = "B"
            min_score = 5
        "#;
        assert!(ServerConfig::from_toml_str(unordered).is_err());
        assert!(ServerConfig::from_toml_str("bind_addr = [").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("league.toml")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
