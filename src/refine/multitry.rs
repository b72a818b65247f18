use std::sync::Mutex;
use std::time::Instant;

use crate::config::{FmParams, PartitionParams};
use crate::hypergraph::Hypergraph;
use crate::objective;
use crate::partition::PartitionedHypergraph;
use crate::refine::localized::LocalizedKWayFm;
use crate::refine::rollback::rollback_to_best_prefix;
use crate::refine::{FmSharedData, SearchStats};
use crate::types::{EdgeWeight, Gain};

/// Outcome of one `refine` call.
#[derive(Debug, Clone, Copy)]
pub struct FmResult {
    /// Whether any round improved the objective.
    pub improved: bool,
    /// Rounds actually run (the loop stops early without improvement).
    pub rounds: usize,
    /// Moves committed by searches across all rounds, before rollback.
    pub moves_committed: usize,
    /// Queue activity of all searches across all rounds.
    pub search_stats: SearchStats,
    pub km1_before: EdgeWeight,
    pub km1_after: EdgeWeight,
    pub cut_before: EdgeWeight,
    pub cut_after: EdgeWeight,
}

/// Parallel multi-try k-way FM refinement.
///
/// Each round seeds one localized search per available border vertex:
/// workers pop seeds from a sharded queue and run searches that reserve
/// vertices through the shared node tracker, so no two searches ever
/// touch the same vertex. After a round quiesces, the global rollback
/// keeps the best balanced prefix of all committed moves. Rounds repeat
/// until one fails to improve or the round budget runs out.
pub struct MultiTryKWayFm {
    partition: PartitionParams,
    fm: FmParams,
    shared: FmSharedData,
    num_workers: usize,
}

impl MultiTryKWayFm {
    pub fn new(
        partition: PartitionParams,
        fm: FmParams,
        num_nodes: usize,
        num_edges: usize,
    ) -> Self {
        let num_workers = rayon::current_num_threads().max(1);
        Self {
            partition,
            fm,
            shared: FmSharedData::new(num_nodes, num_edges, num_workers),
            num_workers,
        }
    }

    pub fn partition_params(&self) -> &PartitionParams {
        &self.partition
    }

    /// Run up to `multitry_rounds` rounds of parallel localized FM on the
    /// partitioned hypergraph, initializing the gain cache if the caller
    /// has not done so yet.
    pub fn refine<H: Hypergraph>(&mut self, phg: &mut PartitionedHypergraph<'_, H>) -> FmResult {
        assert!(phg.k() == self.partition.k, "refiner and partition disagree on k");
        let deadline = self.fm.time_limit.map(|limit| Instant::now() + limit);

        if !phg.is_gain_cache_initialized() {
            phg.initialize_gain_cache();
        }

        let km1_before = objective::km1(phg);
        let cut_before = objective::cut(phg);
        let mut overall_improvement: Gain = 0;
        let mut rounds = 0;
        let mut moves_committed = 0;
        let search_stats = Mutex::new(SearchStats::default());

        for round in 0..self.fm.multitry_rounds {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            self.prepare_round(phg, round);
            if self.shared.seeds.is_empty() {
                break;
            }
            rounds += 1;

            let phg: &PartitionedHypergraph<'_, H> = phg;
            let shared = &self.shared;
            let partition = &self.partition;
            let fm = &self.fm;
            let k = self.partition.k as usize;
            let search_stats = &search_stats;
            rayon::scope(|scope| {
                for worker in 0..self.num_workers {
                    scope.spawn(move |_| {
                        let mut search = LocalizedKWayFm::new(k);
                        while let Some(seed) = shared.seeds.try_pop(worker) {
                            if deadline.is_some_and(|d| Instant::now() >= d) {
                                break;
                            }
                            // The partition may have shifted since the
                            // seed was collected.
                            if phg.is_border_node(seed) {
                                let sid = shared.tracker.mint_search_id();
                                search.find_moves(phg, shared, partition, fm, seed, sid);
                            }
                        }
                        search_stats.lock().unwrap().merge(search.stats());
                    });
                }
            });

            moves_committed += self.shared.moves.len();
            let improvement = rollback_to_best_prefix(phg, &self.shared, &self.partition);
            if improvement > 0 {
                overall_improvement += improvement;
            } else {
                break;
            }
        }

        FmResult {
            improved: overall_improvement > 0,
            rounds,
            moves_committed,
            search_stats: search_stats.into_inner().unwrap(),
            km1_before,
            km1_after: objective::km1(phg),
            cut_before,
            cut_after: objective::cut(phg),
        }
    }

    /// Reset the shared round state and queue all border vertices as
    /// seeds, in a deterministic order for a fixed seed and thread count.
    fn prepare_round<H: Hypergraph>(
        &mut self,
        phg: &PartitionedHypergraph<'_, H>,
        round: usize,
    ) {
        self.shared.reset_round(phg.hypergraph());
        let seeds = &self.shared.seeds;
        phg.hypergraph().for_each_node(|v| {
            if phg.is_border_node(v) {
                seeds.push(v);
            }
        });
        if self.fm.shuffle {
            self.shared.seeds.shuffle(self.fm.seed ^ round as u64);
        } else {
            self.shared.seeds.sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Objective;
    use crate::hypergraph::StaticHypergraph;
    use crate::types::{BlockId, NodeId};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn refine_instance(
        hg: &StaticHypergraph,
        k: BlockId,
        epsilon: f64,
        parts: &[BlockId],
        fm: FmParams,
    ) -> (FmResult, Vec<BlockId>, bool) {
        let params = PartitionParams::new(k, epsilon, Objective::Km1, hg.total_weight());
        let mut phg = PartitionedHypergraph::new(k, hg);
        for (v, &p) in parts.iter().enumerate() {
            phg.set_only_node_part(v as NodeId, p);
        }
        phg.initialize_partition();

        let mut refiner = MultiTryKWayFm::new(
            params.clone(),
            fm,
            hg.num_nodes() as usize,
            hg.num_edges() as usize,
        );
        let result = refiner.refine(&mut phg);
        let final_parts = (0..hg.num_nodes()).map(|v| phg.part_id(v)).collect();
        let consistent = phg.check_tracked_partition_information()
            && objective::is_balanced(&phg, &params);
        (result, final_parts, consistent)
    }

    #[test]
    fn improves_a_path_partition() {
        // Pinned to one worker with shuffling off so the trajectory is
        // reproducible; the multi-threaded path is covered below.
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let (result, _, consistent) = pool.install(|| {
            let hg = StaticHypergraph::with_unit_weights(
                5,
                &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
            );
            let fm = FmParams { max_non_improving_moves: 5, shuffle: false, ..FmParams::default() };
            refine_instance(&hg, 2, 0.5, &[0, 0, 1, 0, 1], fm)
        });

        assert!(result.improved);
        assert_eq!(result.km1_before, 3);
        assert_eq!(result.km1_after, 1);
        assert!(result.search_stats.moves >= 1);
        assert!(result.search_stats.pushes >= result.search_stats.extractions);
        assert!(consistent);
    }

    #[test]
    fn leaves_an_optimal_partition_alone() {
        let hg = StaticHypergraph::with_unit_weights(
            5,
            &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
        );
        let fm = FmParams { max_non_improving_moves: 5, ..FmParams::default() };
        let (result, parts, consistent) = refine_instance(&hg, 2, 0.5, &[0, 0, 0, 1, 1], fm);

        assert!(!result.improved);
        assert_eq!(result.km1_after, 1);
        assert_eq!(parts, vec![0, 0, 0, 1, 1]);
        assert!(consistent);
    }

    #[test]
    fn never_worsens_random_instances() {
        let mut rng = StdRng::seed_from_u64(7);
        for trial in 0..5 {
            let num_nodes = 40;
            let num_edges = 60;
            let edges: Vec<Vec<NodeId>> = (0..num_edges)
                .map(|_| {
                    let size = rng.random_range(2..=4);
                    let mut pins: Vec<NodeId> = Vec::new();
                    while pins.len() < size {
                        let pin = rng.random_range(0..num_nodes as NodeId);
                        if !pins.contains(&pin) {
                            pins.push(pin);
                        }
                    }
                    pins
                })
                .collect();
            let hg = StaticHypergraph::with_unit_weights(num_nodes, &edges);
            let k = 3;
            let parts: Vec<BlockId> =
                (0..num_nodes).map(|v| (v % k as usize) as BlockId).collect();

            let fm = FmParams { max_non_improving_moves: 5, ..FmParams::default() };
            let (result, _, consistent) = refine_instance(&hg, k, 0.1, &parts, fm);
            assert!(
                result.km1_after <= result.km1_before,
                "trial {trial} worsened the objective"
            );
            assert!(consistent, "trial {trial} left inconsistent state");
        }
    }

    #[test]
    fn respects_an_expired_time_limit() {
        let hg = StaticHypergraph::with_unit_weights(
            5,
            &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
        );
        let params = PartitionParams::new(2, 0.5, Objective::Km1, hg.total_weight());
        let mut phg = PartitionedHypergraph::new(2, &hg);
        for (v, p) in [(0, 0), (1, 0), (2, 1), (3, 0), (4, 1)] {
            phg.set_only_node_part(v, p);
        }
        phg.initialize_partition();

        let mut refiner = MultiTryKWayFm::new(
            params,
            FmParams { time_limit: Some(std::time::Duration::ZERO), ..FmParams::default() },
            5,
            4,
        );
        let result = refiner.refine(&mut phg);
        assert!(!result.improved);
        assert_eq!(result.rounds, 0);
        assert_eq!(result.km1_after, result.km1_before);
    }
}
