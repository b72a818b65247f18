use std::sync::atomic::{AtomicBool, Ordering};

use crate::hypergraph::Hypergraph;
use crate::types::{EdgeId, EdgeWeight, NodeId, NodeWeight};

/// A weighted hypergraph in compressed sparse row format, storing both the
/// edge-to-pin and the vertex-to-incident-edge incidence.
///
/// The structure itself is immutable after construction; only the per-node
/// and per-edge *enabled* flags can change, which is what the uncoarsening
/// hooks need (restoring previously removed vertices and single-pin nets).
/// During refinement everything is enabled.
#[derive(Debug)]
pub struct StaticHypergraph {
    num_nodes: usize,
    edge_offsets: Vec<u32>,
    pins: Vec<NodeId>,
    node_offsets: Vec<u32>,
    incident: Vec<EdgeId>,
    node_weights: Vec<NodeWeight>,
    edge_weights: Vec<EdgeWeight>,
    node_enabled: Vec<AtomicBool>,
    edge_enabled: Vec<AtomicBool>,
    total_weight: NodeWeight,
    max_edge_size: usize,
}

impl StaticHypergraph {
    /// Construct a hypergraph from per-edge pin lists and explicit weights.
    pub fn new(
        num_nodes: usize,
        edges: &[Vec<NodeId>],
        edge_weights: Vec<EdgeWeight>,
        node_weights: Vec<NodeWeight>,
    ) -> Self {
        assert!(edge_weights.len() == edges.len(), "edge_weights.len() must equal number of edges");
        assert!(node_weights.len() == num_nodes, "node_weights.len() must equal num_nodes");

        // Canonicalize: pins of an edge are stored sorted and must be
        // distinct and in range.
        let edges = edges
            .iter()
            .enumerate()
            .map(|(i, pins)| {
                assert!(!pins.is_empty(), "edge {i} has no pins");
                let mut pins = pins.clone();
                pins.sort_unstable();
                for window in pins.windows(2) {
                    assert!(window[0] != window[1], "edge {i} lists a pin twice");
                }
                for &pin in &pins {
                    assert!((pin as usize) < num_nodes, "edge {i} pin {pin} out of range");
                }
                pins
            })
            .collect::<Vec<_>>();

        // Edge-to-pin side.
        let edge_offsets = std::iter::once(0u32)
            .chain(edges.iter().map(|pins| pins.len() as u32).scan(0u32, |acc, len| {
                *acc += len;
                Some(*acc)
            }))
            .collect::<Vec<_>>();
        let pins = edges.iter().flatten().copied().collect::<Vec<NodeId>>();

        // Vertex-to-edge side, via counting sort over the pins.
        let mut degrees = vec![0u32; num_nodes];
        for &pin in &pins {
            degrees[pin as usize] += 1;
        }
        let mut node_offsets = vec![0u32; num_nodes + 1];
        for v in 0..num_nodes {
            node_offsets[v + 1] = node_offsets[v] + degrees[v];
        }
        let mut incident = vec![0 as EdgeId; pins.len()];
        let mut cursor = node_offsets[..num_nodes].to_vec();
        for (e, pins_of_e) in edges.iter().enumerate() {
            for &pin in pins_of_e {
                incident[cursor[pin as usize] as usize] = e as EdgeId;
                cursor[pin as usize] += 1;
            }
        }

        let total_weight = node_weights.iter().sum();
        let max_edge_size = edges.iter().map(|pins| pins.len()).max().unwrap_or(0);
        let num_edges = edges.len();

        Self {
            num_nodes,
            edge_offsets,
            pins,
            node_offsets,
            incident,
            node_weights,
            edge_weights,
            node_enabled: (0..num_nodes).map(|_| AtomicBool::new(true)).collect(),
            edge_enabled: (0..num_edges).map(|_| AtomicBool::new(true)).collect(),
            total_weight,
            max_edge_size,
        }
    }

    /// Construct a hypergraph with unit vertex and edge weights.
    pub fn with_unit_weights(num_nodes: usize, edges: &[Vec<NodeId>]) -> Self {
        Self::new(num_nodes, edges, vec![1; edges.len()], vec![1; num_nodes])
    }

    /// Enable a vertex (must be disabled). Used when uncoarsening restores
    /// a contracted vertex into the partition.
    pub fn enable_node(&self, v: NodeId) {
        let was = self.node_enabled[v as usize].swap(true, Ordering::Relaxed);
        debug_assert!(!was, "node {} was already enabled", v);
    }

    /// Disable a vertex (must be enabled).
    pub fn disable_node(&self, v: NodeId) {
        let was = self.node_enabled[v as usize].swap(false, Ordering::Relaxed);
        debug_assert!(was, "node {} was already disabled", v);
    }

    /// Enable a hyperedge (must be disabled). Used when restoring removed
    /// single-pin nets.
    pub fn enable_edge(&self, e: EdgeId) {
        let was = self.edge_enabled[e as usize].swap(true, Ordering::Relaxed);
        debug_assert!(!was, "edge {} was already enabled", e);
    }

    /// Disable a hyperedge (must be enabled).
    pub fn disable_edge(&self, e: EdgeId) {
        let was = self.edge_enabled[e as usize].swap(false, Ordering::Relaxed);
        debug_assert!(was, "edge {} was already disabled", e);
    }
}

impl Hypergraph for StaticHypergraph {
    #[inline]
    fn num_nodes(&self) -> NodeId {
        self.num_nodes as NodeId
    }

    #[inline]
    fn num_edges(&self) -> EdgeId {
        self.edge_weights.len() as EdgeId
    }

    #[inline]
    fn num_pins(&self) -> usize {
        self.pins.len()
    }

    #[inline]
    fn total_weight(&self) -> NodeWeight {
        self.total_weight
    }

    #[inline]
    fn max_edge_size(&self) -> usize {
        self.max_edge_size
    }

    #[inline]
    fn node_weight(&self, v: NodeId) -> NodeWeight {
        self.node_weights[v as usize]
    }

    #[inline]
    fn degree(&self, v: NodeId) -> usize {
        (self.node_offsets[v as usize + 1] - self.node_offsets[v as usize]) as usize
    }

    #[inline]
    fn edge_weight(&self, e: EdgeId) -> EdgeWeight {
        self.edge_weights[e as usize]
    }

    #[inline]
    fn edge_size(&self, e: EdgeId) -> usize {
        (self.edge_offsets[e as usize + 1] - self.edge_offsets[e as usize]) as usize
    }

    #[inline]
    fn pins(&self, e: EdgeId) -> &[NodeId] {
        let range = self.edge_offsets[e as usize] as usize..self.edge_offsets[e as usize + 1] as usize;
        &self.pins[range]
    }

    #[inline]
    fn incident_edges(&self, v: NodeId) -> &[EdgeId] {
        let range = self.node_offsets[v as usize] as usize..self.node_offsets[v as usize + 1] as usize;
        &self.incident[range]
    }

    #[inline]
    fn node_is_enabled(&self, v: NodeId) -> bool {
        self.node_enabled[v as usize].load(Ordering::Relaxed)
    }

    #[inline]
    fn edge_is_enabled(&self, e: EdgeId) -> bool {
        self.edge_enabled[e as usize].load(Ordering::Relaxed)
    }
}
