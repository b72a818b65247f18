use rayon::prelude::*;

use crate::config::{Objective, PartitionParams};
use crate::hypergraph::Hypergraph;
use crate::objective;
use crate::partition::PartitionedHypergraph;
use crate::refine::FmSharedData;
use crate::types::{EdgeId, EdgeWeight, Gain, NodeWeight};

/// Linearize the round's committed moves by sequence number, find the
/// prefix with the best objective that leaves the partition balanced, and
/// revert everything after it. Returns the objective improvement of the
/// kept prefix (0 when everything is reverted).
///
/// Reverts and re-applies go through the regular move primitive so pin
/// counts, connectivity sets and the gain cache stay delta-consistent;
/// afterwards the benefit entries of all moved vertices are recomputed,
/// since a vertex's own benefit is not maintained across its own move.
pub(crate) fn rollback_to_best_prefix<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    shared: &FmSharedData,
    partition: &PartitionParams,
) -> Gain {
    #[cfg(feature = "optimistic-rollback")]
    {
        rollback_optimistic(phg, shared, partition)
    }
    #[cfg(not(feature = "optimistic-rollback"))]
    {
        rollback_recomputed(phg, shared, partition)
    }
}

/// The correctness-first variant: unwind the whole round move by move,
/// measuring each move's *effective* gain from the pin counts at replay
/// time (concurrent moves can make it differ from the gain the search
/// cached), then re-apply the winning prefix.
pub(crate) fn rollback_recomputed<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    shared: &FmSharedData,
    partition: &PartitionParams,
) -> Gain {
    let num_moves = shared.moves.len();
    if num_moves == 0 {
        return 0;
    }

    let mut balanced = vec![false; num_moves + 1];
    balanced[num_moves] = objective::is_balanced(phg, partition);
    let mut gains = vec![0 as Gain; num_moves];

    for i in (0..num_moves).rev() {
        let m = shared.moves.get(i);
        debug_assert!(shared.tracker.is_moved(m.node));
        let mut gain: Gain = 0;
        // Undoing move i transforms the prefix-i state into prefix i-1,
        // so the objective delta of the undo *is* move i's effective gain.
        let undone = phg.change_node_part_full_update(
            m.node,
            m.to,
            m.from,
            NodeWeight::MAX,
            || {},
            |e, we, _, count_in_left_after, count_in_entered_after| {
                gain += objective_delta_term(
                    phg,
                    partition.objective,
                    e,
                    we,
                    count_in_left_after,
                    count_in_entered_after,
                );
            },
        );
        debug_assert!(undone, "undoing a committed move cannot fail");
        gains[i] = gain;
        balanced[i] = objective::is_balanced(phg, partition);
    }

    let (prefix, best_gain) = best_prefix(&gains, &balanced);
    for i in 0..prefix {
        let m = shared.moves.get(i);
        let reapplied = phg.change_node_part_full_update(
            m.node,
            m.from,
            m.to,
            NodeWeight::MAX,
            || {},
            |_, _, _, _, _| {},
        );
        debug_assert!(reapplied, "re-applying a previously feasible move cannot fail");
    }

    repair_moved_benefits(phg, shared, num_moves);
    best_gain
}

/// The optimistic variant (`optimistic-rollback` feature): trust the gains
/// recorded at move time, simulate block weights backwards for the balance
/// check, and revert only the tail. Cheaper, but the recorded gains can be
/// stale when concurrent searches interleaved on shared edges.
#[cfg(feature = "optimistic-rollback")]
pub(crate) fn rollback_optimistic<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    shared: &FmSharedData,
    partition: &PartitionParams,
) -> Gain {
    let num_moves = shared.moves.len();
    if num_moves == 0 {
        return 0;
    }
    let k = phg.k() as usize;

    let mut weights: Vec<NodeWeight> = (0..phg.k()).map(|p| phg.part_weight(p)).collect();
    let all_within_caps = |weights: &[NodeWeight]| {
        (0..k).all(|p| weights[p] <= partition.max_part_weight(p as u32))
    };
    let mut balanced = vec![false; num_moves + 1];
    balanced[num_moves] = all_within_caps(&weights);
    for i in (0..num_moves).rev() {
        let m = shared.moves.get(i);
        let wv = phg.hypergraph().node_weight(m.node);
        weights[m.to as usize] -= wv;
        weights[m.from as usize] += wv;
        balanced[i] = all_within_caps(&weights);
    }

    let gains: Vec<Gain> = (0..num_moves).map(|i| shared.moves.get(i).gain).collect();
    let (prefix, best_gain) = best_prefix(&gains, &balanced);

    for i in (prefix..num_moves).rev() {
        let m = shared.moves.get(i);
        let undone = phg.change_node_part_full_update(
            m.node,
            m.to,
            m.from,
            NodeWeight::MAX,
            || {},
            |_, _, _, _, _| {},
        );
        debug_assert!(undone, "undoing a committed move cannot fail");
    }

    repair_moved_benefits(phg, shared, num_moves);
    best_gain
}

/// One edge's contribution to the objective delta of a restore step. The
/// restore moved a vertex out of `left` (its block during the round) back
/// into `entered` (its block before the move being undone).
fn objective_delta_term<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    objective: Objective,
    e: EdgeId,
    we: EdgeWeight,
    count_in_left_after: u32,
    count_in_entered_after: u32,
) -> Gain {
    let entered_is_new = count_in_entered_after == 1;
    let left_emptied = count_in_left_after == 0;
    match objective {
        Objective::Km1 => {
            Gain::from(entered_is_new) * we - Gain::from(left_emptied) * we
        }
        Objective::Cut => match (entered_is_new, left_emptied) {
            // One spanned block swapped for another: cut status unchanged.
            (true, true) | (false, false) => 0,
            (true, false) => {
                if phg.connectivity(e) == 2 {
                    we
                } else {
                    0
                }
            }
            (false, true) => {
                if phg.connectivity(e) == 1 {
                    -we
                } else {
                    0
                }
            }
        },
    }
}

/// The prefix length maximizing the cumulative gain over feasible
/// prefixes, ties toward the shortest. Prefix 0 (revert everything) is
/// the fallback when nothing feasible improves.
fn best_prefix(gains: &[Gain], balanced: &[bool]) -> (usize, Gain) {
    debug_assert!(balanced.len() == gains.len() + 1);
    let mut best_gain: Gain = 0;
    let mut best_len = 0;
    let mut cumulative: Gain = 0;
    for (i, &gain) in gains.iter().enumerate() {
        cumulative += gain;
        if balanced[i + 1] && cumulative > best_gain {
            best_gain = cumulative;
            best_len = i + 1;
        }
    }
    (best_len, best_gain)
}

/// A vertex's own-block benefit is not maintained across its own move, so
/// every vertex that appears in the round's log gets its entry rebuilt
/// from current pin counts. Each vertex moves at most once per round, so
/// the log entries name distinct vertices.
fn repair_moved_benefits<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    shared: &FmSharedData,
    num_moves: usize,
) {
    (0..num_moves).into_par_iter().for_each(|i| {
        phg.recompute_move_from_benefit(shared.moves.get(i).node);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Objective;
    use crate::hypergraph::StaticHypergraph;
    use crate::refine::Move;
    use crate::types::{BlockId, NodeId};

    #[test]
    fn best_prefix_takes_the_cumulative_maximum() {
        // Gains +3, -1, +2, -5, +4 accumulate to 3, 2, 4, -1, 3: the best
        // prefix ends after the third move.
        let gains = [3, -1, 2, -5, 4];
        let balanced = [true; 6];
        assert_eq!(best_prefix(&gains, &balanced), (3, 4));
    }

    #[test]
    fn best_prefix_skips_unbalanced_states() {
        let gains = [3, -1, 2, -5, 4];
        let mut balanced = [true; 6];
        balanced[3] = false;
        // The cumulative maximum sits at an unbalanced prefix; fall back
        // to the best balanced one (the first reaching +3).
        assert_eq!(best_prefix(&gains, &balanced), (1, 3));
    }

    #[test]
    fn best_prefix_reverts_everything_without_improvement() {
        assert_eq!(best_prefix(&[-2, -1, 1], &[true; 4]), (0, 0));
        assert_eq!(best_prefix(&[], &[true]), (0, 0));
    }

    fn path_setup<'a>(
        hg: &'a StaticHypergraph,
        parts: &[BlockId],
    ) -> PartitionedHypergraph<'a, StaticHypergraph> {
        let mut phg = PartitionedHypergraph::new(2, hg);
        for (v, &p) in parts.iter().enumerate() {
            phg.set_only_node_part(v as NodeId, p);
        }
        phg.initialize_partition();
        phg.initialize_gain_cache();
        phg
    }

    /// Commit a move the way a search would: through the full-update
    /// primitive, recording the cached gain in the log.
    fn commit<H: Hypergraph>(
        phg: &PartitionedHypergraph<'_, H>,
        shared: &FmSharedData,
        v: NodeId,
        from: BlockId,
        to: BlockId,
    ) {
        let gain = phg.km1_gain(v, from, to);
        let moved =
            phg.change_node_part_full_update(v, from, to, NodeWeight::MAX, || {}, |_, _, _, _, _| {});
        assert!(moved);
        shared.tracker.mark_moved(v);
        shared.moves.append(Move { node: v, from, to, gain });
    }

    #[test]
    fn reverts_the_losing_tail() {
        let hg = StaticHypergraph::with_unit_weights(
            5,
            &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
        );
        let params = PartitionParams::new(2, 0.5, Objective::Km1, hg.total_weight());
        let phg = path_setup(&hg, &[0, 0, 1, 0, 1]);
        let shared = FmSharedData::new(5, 4, 1);
        shared.reset_round(&hg);

        commit(&phg, &shared, 2, 1, 0); // gain +2
        commit(&phg, &shared, 1, 0, 1); // gain -2
        assert_eq!(objective::km1(&phg), 3);

        let improvement = rollback_recomputed(&phg, &shared, &params);
        assert_eq!(improvement, 2);
        assert_eq!(phg.part_id(2), 0);
        assert_eq!(phg.part_id(1), 0);
        assert_eq!(objective::km1(&phg), 1);
        assert!(phg.check_tracked_partition_information());
    }

    #[test]
    fn keeps_everything_when_all_moves_help() {
        let hg = StaticHypergraph::with_unit_weights(
            5,
            &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
        );
        let params = PartitionParams::new(2, 0.5, Objective::Km1, hg.total_weight());
        let phg = path_setup(&hg, &[0, 0, 1, 1, 0]);
        let shared = FmSharedData::new(5, 4, 1);
        shared.reset_round(&hg);

        // km1 is 2 (e1 and e3 are cut); pulling 4 into block 1 fixes e3.
        commit(&phg, &shared, 4, 0, 1);
        assert_eq!(objective::km1(&phg), 1);

        let improvement = rollback_recomputed(&phg, &shared, &params);
        assert_eq!(improvement, 1);
        assert_eq!(phg.part_id(4), 1);
        assert_eq!(objective::km1(&phg), 1);
        assert!(phg.check_tracked_partition_information());
    }

    #[test]
    fn empty_round_is_a_noop() {
        let hg = StaticHypergraph::with_unit_weights(2, &[vec![0, 1]]);
        let params = PartitionParams::new(2, 1.0, Objective::Km1, 2);
        let phg = path_setup(&hg, &[0, 1]);
        let shared = FmSharedData::new(2, 1, 1);
        shared.reset_round(&hg);

        assert_eq!(rollback_recomputed(&phg, &shared, &params), 0);
        assert_eq!(phg.part_id(0), 0);
        assert_eq!(phg.part_id(1), 1);
    }

    #[test]
    fn effective_gains_override_stale_recorded_ones() {
        // A move logged with a wildly wrong gain: prefix selection must
        // price it from the pin counts at replay time, not the record.
        let hg = StaticHypergraph::with_unit_weights(
            6,
            &[vec![0, 1, 2], vec![2, 3], vec![3, 4, 5], vec![1, 3]],
        );
        let params = PartitionParams::new(2, 1.0, Objective::Km1, hg.total_weight());
        let phg = path_setup(&hg, &[0, 0, 0, 1, 1, 1]);
        let shared = FmSharedData::new(6, 4, 1);
        shared.reset_round(&hg);

        // Record a deliberately wrong gain for the move.
        let moved = phg.change_node_part_full_update(3, 1, 0, NodeWeight::MAX, || {}, |_, _, _, _, _| {});
        assert!(moved);
        shared.tracker.mark_moved(3);
        shared.moves.append(Move { node: 3, from: 1, to: 0, gain: 100 });

        let improvement = rollback_recomputed(&phg, &shared, &params);
        // True gain of the move: e1 and e3 become internal (+2), e2 gets
        // cut (-1), so the prefix is kept at its real value.
        assert_eq!(improvement, 1);
        assert_eq!(phg.part_id(3), 0);
        assert!(phg.check_tracked_partition_information());
    }

    #[cfg(feature = "optimistic-rollback")]
    #[test]
    fn optimistic_matches_recomputation_on_quiescent_rounds() {
        // In a single-threaded round the cached gains are exact, so both
        // rollback variants must agree move for move.
        let hg = StaticHypergraph::with_unit_weights(
            5,
            &[vec![0, 1], vec![1, 2], vec![2, 3], vec![3, 4]],
        );
        let params = PartitionParams::new(2, 0.5, Objective::Km1, hg.total_weight());

        let run = |optimistic: bool| {
            let phg = path_setup(&hg, &[0, 0, 1, 0, 1]);
            let shared = FmSharedData::new(5, 4, 1);
            shared.reset_round(&hg);
            commit(&phg, &shared, 2, 1, 0);
            commit(&phg, &shared, 1, 0, 1);
            let improvement = if optimistic {
                rollback_optimistic(&phg, &shared, &params)
            } else {
                rollback_recomputed(&phg, &shared, &params)
            };
            let parts: Vec<_> = (0..5).map(|v| phg.part_id(v)).collect();
            (improvement, parts)
        };

        assert_eq!(run(true), run(false));
    }
}
