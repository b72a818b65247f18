use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{BlockId, NodeWeight};

/// Objective function minimized by refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Connectivity metric: sum over edges of w(e) * (lambda(e) - 1).
    Km1,
    /// Cut metric: total weight of edges spanning more than one block.
    Cut,
}

/// Static parameters of the partitioning problem: number of blocks,
/// imbalance tolerance, objective, and the per-block weight caps derived
/// from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionParams {
    pub k: BlockId,
    pub epsilon: f64,
    pub objective: Objective,
    pub max_part_weights: Vec<NodeWeight>,
}

impl PartitionParams {
    /// Derive parameters with the uniform balance constraint
    /// `max_part_weight = (1 + epsilon) * ceil(total_weight / k)`.
    pub fn new(k: BlockId, epsilon: f64, objective: Objective, total_weight: NodeWeight) -> Self {
        assert!(k >= 2, "need at least two blocks, got {}", k);
        assert!(epsilon >= 0.0, "imbalance tolerance must be non-negative");
        assert!(total_weight > 0, "total weight must be positive");

        let average = (total_weight + NodeWeight::from(k) - 1) / NodeWeight::from(k);
        let max_weight = ((1.0 + epsilon) * average as f64).floor() as NodeWeight;
        Self {
            k,
            epsilon,
            objective,
            max_part_weights: vec![max_weight; k as usize],
        }
    }

    /// Derive parameters with explicit per-block weight caps.
    pub fn with_max_part_weights(
        k: BlockId,
        epsilon: f64,
        objective: Objective,
        max_part_weights: Vec<NodeWeight>,
    ) -> Self {
        assert!(max_part_weights.len() == k as usize, "need one weight cap per block");
        Self { k, epsilon, objective, max_part_weights }
    }

    #[inline]
    pub fn max_part_weight(&self, p: BlockId) -> NodeWeight {
        self.max_part_weights[p as usize]
    }
}

/// Tuning knobs of the multi-try FM refiner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FmParams {
    /// Maximum number of multi-try rounds per call to `refine`.
    pub multitry_rounds: usize,
    /// A localized search stops after this many consecutive moves that did
    /// not improve on its best seen cumulative gain.
    pub max_non_improving_moves: usize,
    /// Hard cap on the number of moves a single localized search commits.
    pub max_moves_per_search: usize,
    /// Shuffle each seed queue shard before a round starts.
    pub shuffle: bool,
    /// Release reserved-but-unmoved vertices when a search finishes, making
    /// them available to later searches in the same round.
    pub release_nodes: bool,
    /// Seed for the shard shuffle RNG.
    pub seed: u64,
    /// Wall-clock budget for a whole `refine` call; checked between seeds.
    pub time_limit: Option<Duration>,
}

impl Default for FmParams {
    fn default() -> Self {
        Self {
            multitry_rounds: 10,
            max_non_improving_moves: 350,
            max_moves_per_search: usize::MAX,
            shuffle: true,
            release_nodes: true,
            seed: 0,
            time_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_max_part_weights() {
        let params = PartitionParams::new(4, 0.0, Objective::Km1, 10);
        // ceil(10 / 4) = 3
        assert_eq!(params.max_part_weights, vec![3, 3, 3, 3]);

        let params = PartitionParams::new(2, 0.5, Objective::Km1, 10);
        // floor(1.5 * 5) = 7
        assert_eq!(params.max_part_weight(0), 7);
        assert_eq!(params.max_part_weight(1), 7);
    }

    #[test]
    #[should_panic(expected = "need at least two blocks")]
    fn rejects_single_block() {
        PartitionParams::new(1, 0.0, Objective::Cut, 10);
    }

    #[test]
    #[should_panic(expected = "one weight cap per block")]
    fn rejects_cap_length_mismatch() {
        PartitionParams::with_max_part_weights(3, 0.0, Objective::Km1, vec![5, 5]);
    }
}
