use crate::config::{Objective, PartitionParams};
use crate::hypergraph::Hypergraph;
use crate::partition::PartitionedHypergraph;
use crate::types::{EdgeWeight, NodeWeight};

/// Connectivity metric: sum over enabled edges of w(e) * (lambda(e) - 1).
pub fn km1<H: Hypergraph>(phg: &PartitionedHypergraph<'_, H>) -> EdgeWeight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .filter(|&e| hg.edge_is_enabled(e))
        .map(|e| hg.edge_weight(e) * (phg.connectivity(e).max(1) as EdgeWeight - 1))
        .sum()
}

/// Cut metric: total weight of enabled edges spanning more than one block.
pub fn cut<H: Hypergraph>(phg: &PartitionedHypergraph<'_, H>) -> EdgeWeight {
    let hg = phg.hypergraph();
    (0..hg.num_edges())
        .filter(|&e| hg.edge_is_enabled(e) && phg.connectivity(e) > 1)
        .map(|e| hg.edge_weight(e))
        .sum()
}

/// The configured objective's value.
pub fn quality<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    objective: Objective,
) -> EdgeWeight {
    match objective {
        Objective::Km1 => km1(phg),
        Objective::Cut => cut(phg),
    }
}

/// Relative overload of the heaviest block:
/// `max_p part_weight(p) / ceil(total_weight / k) - 1`.
pub fn imbalance<H: Hypergraph>(phg: &PartitionedHypergraph<'_, H>) -> f64 {
    let k = phg.k() as NodeWeight;
    let average = (phg.hypergraph().total_weight() + k - 1) / k;
    let heaviest = (0..phg.k()).map(|p| phg.part_weight(p)).max().unwrap_or(0);
    heaviest as f64 / average as f64 - 1.0
}

/// True iff every block respects its weight cap.
pub fn is_balanced<H: Hypergraph>(
    phg: &PartitionedHypergraph<'_, H>,
    params: &PartitionParams,
) -> bool {
    (0..phg.k()).all(|p| phg.part_weight(p) <= params.max_part_weight(p))
}
