use rayon::prelude::*;

use crate::types::{EdgeId, EdgeWeight, NodeId, NodeWeight};

/// Capability interface of an unpartitioned hypergraph.
///
/// Two representations (a static CSR one and, in principle, a dynamic one
/// supporting contractions) satisfy the same capability set; everything in
/// the refinement core is generic over this trait rather than a concrete
/// type. Implementations must be safe to read from many threads at once.
pub trait Hypergraph: Sync {
    /// Number of vertices, including disabled ones.
    fn num_nodes(&self) -> NodeId;

    /// Number of hyperedges, including disabled ones.
    fn num_edges(&self) -> EdgeId;

    /// Total number of pins over all hyperedges.
    fn num_pins(&self) -> usize;

    /// Sum of all enabled vertex weights.
    fn total_weight(&self) -> NodeWeight;

    /// Size of the largest hyperedge.
    fn max_edge_size(&self) -> usize;

    fn node_weight(&self, v: NodeId) -> NodeWeight;

    /// Number of hyperedges incident to `v`.
    fn degree(&self, v: NodeId) -> usize;

    fn edge_weight(&self, e: EdgeId) -> EdgeWeight;

    /// Number of pins of `e`.
    fn edge_size(&self, e: EdgeId) -> usize;

    /// Pins of `e`, ordered and distinct.
    fn pins(&self, e: EdgeId) -> &[NodeId];

    /// Hyperedges incident to `v`, ordered and distinct.
    fn incident_edges(&self, v: NodeId) -> &[EdgeId];

    fn node_is_enabled(&self, v: NodeId) -> bool;

    fn edge_is_enabled(&self, e: EdgeId) -> bool;

    /// Apply `f` to every enabled vertex in parallel.
    fn for_each_node<F>(&self, f: F)
    where
        F: Fn(NodeId) + Sync + Send,
    {
        (0..self.num_nodes()).into_par_iter().for_each(|v| {
            if self.node_is_enabled(v) {
                f(v);
            }
        });
    }

    /// Apply `f` to every enabled hyperedge in parallel.
    fn for_each_edge<F>(&self, f: F)
    where
        F: Fn(EdgeId) + Sync + Send,
    {
        (0..self.num_edges()).into_par_iter().for_each(|e| {
            if self.edge_is_enabled(e) {
                f(e);
            }
        });
    }
}
