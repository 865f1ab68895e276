//! Instance partitioner
//!
//! Picks the instance slot a participant competes in within a tier. The
//! instance id exposed to clients is `"{tier_id}-{slot}"`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Live participant count per instance slot of one tier
pub type InstancePopulation = BTreeMap<u32, usize>;

/// How new instance assignments are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// Stable hash of the participant id modulo `instances_per_tier`.
    ///
    /// Ignores population, so an instance can exceed its capacity.
    Hashed,
    /// Least-populated slot with room; opens a new slot when all are full
    #[default]
    LeastLoaded,
}

/// Public instance identifier for a tier/slot pair
pub fn instance_id(tier_id: &str, slot: u32) -> String {
    format!("{}-{}", tier_id, slot)
}

/// Stable 64-bit hash of a participant id (first 8 bytes of SHA-256)
///
/// Independent of process, platform and Rust version.
pub fn stable_hash(participant_id: &str) -> u64 {
    let digest = Sha256::digest(participant_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    strategy: PartitionStrategy,
    instances_per_tier: u32,
    capacity: usize,
}

impl Partitioner {
    /// `instances_per_tier` and `capacity` are clamped to at least 1
    pub fn new(strategy: PartitionStrategy, instances_per_tier: u32, capacity: usize) -> Self {
        Self {
            strategy,
            instances_per_tier: instances_per_tier.max(1),
            capacity: capacity.max(1),
        }
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    /// Slot for `participant_id` in a tier with the given live population
    ///
    /// `population` must not include the participant being placed.
    pub fn assign(&self, participant_id: &str, population: &InstancePopulation) -> u32 {
        match self.strategy {
            PartitionStrategy::Hashed => self.hashed_slot(participant_id),
            PartitionStrategy::LeastLoaded => self.least_loaded_slot(population),
        }
    }

    pub fn hashed_slot(&self, participant_id: &str) -> u32 {
        (stable_hash(participant_id) % u64::from(self.instances_per_tier)) as u32
    }

    fn least_loaded_slot(&self, population: &InstancePopulation) -> u32 {
        let open = population
            .iter()
            .filter(|(_, count)| **count < self.capacity)
            .min_by_key(|(slot, count)| (**count, **slot))
            .map(|(slot, _)| *slot);

        open.unwrap_or_else(|| first_unused_slot(population))
    }
}

/// Lowest slot number with no entry in `population`
fn first_unused_slot(population: &InstancePopulation) -> u32 {
    let mut candidate = 0u32;
    for slot in population.keys() {
        if *slot != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_format() {
        assert_eq!(instance_id("silver", 7), "silver-7");
    }

    #[test]
    fn test_hashed_is_deterministic_and_bounded() {
        let p = Partitioner::new(PartitionStrategy::Hashed, 100, 50);
        let empty = InstancePopulation::new();
        for id in ["alice", "bob", "user-123", ""] {
            let a = p.assign(id, &empty);
            let b = p.assign(id, &empty);
            assert_eq!(a, b);
            assert!(a < 100);
        }
    }

    #[test]
    fn test_hashed_ignores_population() {
        let p = Partitioner::new(PartitionStrategy::Hashed, 4, 1);
        let slot = p.hashed_slot("carol");
        let mut crowded = InstancePopulation::new();
        crowded.insert(slot, 1000);
        assert_eq!(p.assign("carol", &crowded), slot);
    }

    #[test]
    fn test_least_loaded_starts_at_zero() {
        let p = Partitioner::new(PartitionStrategy::LeastLoaded, 100, 3);
        assert_eq!(p.assign("x", &InstancePopulation::new()), 0);
    }

    #[test]
    fn test_least_loaded_prefers_emptiest_open_slot() {
        let p = Partitioner::new(PartitionStrategy::LeastLoaded, 100, 5);
        let population: InstancePopulation = [(0, 5), (1, 3), (2, 1), (3, 1)].into_iter().collect();
        // Slot 0 is full; slots 2 and 3 tie, lowest wins
        assert_eq!(p.assign("x", &population), 2);
    }

    #[test]
    fn test_least_loaded_opens_new_slot_when_full() {
        let p = Partitioner::new(PartitionStrategy::LeastLoaded, 100, 2);
        let population: InstancePopulation = [(0, 2), (1, 2), (3, 2)].into_iter().collect();
        assert_eq!(p.assign("x", &population), 2);

        let dense: InstancePopulation = [(0, 2), (1, 2)].into_iter().collect();
        assert_eq!(p.assign("x", &dense), 2);
    }

    #[test]
    fn test_least_loaded_never_exceeds_capacity() {
        let capacity = 4;
        let p = Partitioner::new(PartitionStrategy::LeastLoaded, 100, capacity);
        let mut population = InstancePopulation::new();

        for i in 0..37 {
            let slot = p.assign(&format!("p{}", i), &population);
            *population.entry(slot).or_insert(0) += 1;
        }

        assert!(population.values().all(|count| *count <= capacity));
        assert_eq!(population.values().sum::<usize>(), 37);
        assert_eq!(population.len(), 10);
    }

    #[test]
    fn test_stable_hash_known_value() {
        // SHA-256("abc") starts with ba7816bf8f01cfea
        assert_eq!(stable_hash("abc"), 0xba78_16bf_8f01_cfea);
    }
}
