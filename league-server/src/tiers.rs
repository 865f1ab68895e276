//! Tier catalog
//!
//! Static, ordered list of league tiers. Built once from configuration and
//! shared read-only for the life of the process.

use league_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A competitive bracket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub id: String,
    pub name: String,
    /// Inclusive lower bound of cumulative score for this tier
    pub min_cumulative_score: u64,
    /// Position in the catalog, 0 = lowest
    pub rank: usize,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Tier entry as written in `league.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub id: String,
    pub name: String,
    pub min_score: u64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

impl TierDefinition {
    pub fn new(id: &str, name: &str, min_score: u64, color: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            min_score,
            color: Some(color.to_string()),
            icon: Some(icon.to_string()),
        }
    }
}

/// Bronze through Master
pub fn default_tier_definitions() -> Vec<TierDefinition> {
    vec![
        TierDefinition::new("bronze", "Bronze League", 0, "#CD7F32", "🥉"),
        TierDefinition::new("silver", "Silver League", 500, "#C0C0C0", "🥈"),
        TierDefinition::new("gold", "Gold League", 1500, "#FFD700", "🥇"),
        TierDefinition::new("platinum", "Platinum League", 3500, "#E5E4E2", "💎"),
        TierDefinition::new("diamond", "Diamond League", 7000, "#B9F2FF", "💠"),
        TierDefinition::new("master", "Master League", 15000, "#9D00FF", "👑"),
    ]
}

/// Ordered, validated set of tiers
#[derive(Debug, Clone)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    /// Build a catalog, assigning ranks in definition order
    ///
    /// Definitions must be non-empty, have unique non-blank ids, and strictly
    /// ascending `min_score`.
    pub fn new(definitions: Vec<TierDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(Error::Config("tier catalog is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for (i, def) in definitions.iter().enumerate() {
            if def.id.trim().is_empty() {
                return Err(Error::Config(format!("tier #{} has a blank id", i)));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(Error::Config(format!("duplicate tier id '{}'", def.id)));
            }
            if i > 0 && def.min_score <= definitions[i - 1].min_score {
                return Err(Error::Config(format!(
                    "tier '{}' min_score {} must exceed '{}' min_score {}",
                    def.id,
                    def.min_score,
                    definitions[i - 1].id,
                    definitions[i - 1].min_score
                )));
            }
        }

        Ok(Self::from_ordered(definitions))
    }

    fn from_ordered(definitions: Vec<TierDefinition>) -> Self {
        let tiers = definitions
            .into_iter()
            .enumerate()
            .map(|(rank, def)| Tier {
                id: def.id,
                name: def.name,
                min_cumulative_score: def.min_score,
                rank,
                color: def.color,
                icon: def.icon,
            })
            .collect();
        Self { tiers }
    }

    /// Highest tier whose threshold is at or below `cumulative_score`,
    /// falling back to the lowest tier
    pub fn tier_for_score(&self, cumulative_score: u64) -> &Tier {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.min_cumulative_score <= cumulative_score)
            .unwrap_or_else(|| self.lowest())
    }

    pub fn get(&self, tier_id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.id == tier_id)
    }

    pub fn next_tier(&self, tier_id: &str) -> Option<&Tier> {
        self.get(tier_id).and_then(|t| self.tiers.get(t.rank + 1))
    }

    pub fn previous_tier(&self, tier_id: &str) -> Option<&Tier> {
        self.get(tier_id)
            .and_then(|t| t.rank.checked_sub(1))
            .and_then(|rank| self.tiers.get(rank))
    }

    pub fn lowest(&self) -> &Tier {
        &self.tiers[0]
    }

    pub fn highest(&self) -> &Tier {
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::from_ordered(default_tier_definitions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tier() -> TierCatalog {
        TierCatalog::new(vec![
            TierDefinition::new("bronze", "Bronze", 0, "", ""),
            TierDefinition::new("silver", "Silver", 500, "", ""),
        ])
        .unwrap()
    }

    #[test]
    fn test_tier_for_score_thresholds() {
        let catalog = TierCatalog::default();
        assert_eq!(catalog.tier_for_score(0).id, "bronze");
        assert_eq!(catalog.tier_for_score(499).id, "bronze");
        assert_eq!(catalog.tier_for_score(500).id, "silver");
        assert_eq!(catalog.tier_for_score(1499).id, "silver");
        assert_eq!(catalog.tier_for_score(15000).id, "master");
        assert_eq!(catalog.tier_for_score(u64::MAX).id, "master");
    }

    #[test]
    fn test_tier_for_score_is_highest_qualifying() {
        let catalog = TierCatalog::default();
        for score in (0..20_000u64).step_by(37) {
            let tier = catalog.tier_for_score(score);
            assert!(tier.min_cumulative_score <= score);
            if let Some(next) = catalog.next_tier(&tier.id) {
                assert!(next.min_cumulative_score > score);
            }
        }
    }

    #[test]
    fn test_falls_back_to_lowest_when_nothing_qualifies() {
        let catalog = TierCatalog::new(vec![
            TierDefinition::new("rookie", "Rookie", 10, "", ""),
            TierDefinition::new("pro", "Pro", 100, "", ""),
        ])
        .unwrap();
        assert_eq!(catalog.tier_for_score(3).id, "rookie");
    }

    #[test]
    fn test_next_and_previous_at_boundaries() {
        let catalog = two_tier();
        assert_eq!(catalog.next_tier("bronze").map(|t| t.id.as_str()), Some("silver"));
        assert!(catalog.next_tier("silver").is_none());
        assert_eq!(catalog.previous_tier("silver").map(|t| t.id.as_str()), Some("bronze"));
        assert!(catalog.previous_tier("bronze").is_none());
        assert!(catalog.next_tier("unknown").is_none());
    }

    #[test]
    fn test_ranks_are_contiguous() {
        let catalog = TierCatalog::default();
        for (i, tier) in catalog.iter().enumerate() {
            assert_eq!(tier.rank, i);
        }
        assert_eq!(catalog.lowest().id, "bronze");
        assert_eq!(catalog.highest().id, "master");
        assert_eq!(catalog.len(), 6);
    }

    #[test]
    fn test_invalid_catalogs_rejected() {
        assert!(TierCatalog::new(vec![]).is_err());
        assert!(TierCatalog::new(vec![
            TierDefinition::new("a", "A", 0, "", ""),
            TierDefinition::new("a", "A again", 10, "", ""),
        ])
        .is_err());
        assert!(TierCatalog::new(vec![
            TierDefinition::new("a", "A", 100, "", ""),
            TierDefinition::new("b", "B", 100, "", ""),
        ])
        .is_err());
        assert!(TierCatalog::new(vec![TierDefinition::new(" ", "Blank", 0, "", "")]).is_err());
    }

    #[test]
    fn test_default_matches_default_definitions() {
        let built = TierCatalog::new(default_tier_definitions()).unwrap();
        let default = TierCatalog::default();
        assert!(built.iter().eq(default.iter()));
    }
}
