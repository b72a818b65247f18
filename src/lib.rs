#![doc = "Shared-memory parallel multilevel k-way hypergraph partitioning: the refinement core."]
//!
//! Given a hypergraph with vertex and edge weights, a block count k and an
//! imbalance tolerance, this crate maintains a k-way partition under
//! concurrent vertex moves and improves it with parallel localized FM
//! searches. The moving parts:
//!
//! - `hypergraph`: the capability trait plus a static CSR implementation.
//! - `partition`: the partitioned hypergraph with per-edge pin counts,
//!   connectivity sets, and the km1 gain cache, all kept consistent by a
//!   single lock-free move primitive.
//! - `refine`: localized multi-try FM searches over shared reservation
//!   state, followed by a global best-prefix rollback.
//!
//! Coarsening, initial partitioning and the outer multilevel driver are
//! external; they talk to this crate through the interfaces re-exported
//! below.

mod config;
mod hypergraph;
mod io;
mod objective;
mod partition;
mod refine;
mod types;

pub use config::{FmParams, Objective, PartitionParams};
pub use hypergraph::{Hypergraph, StaticHypergraph};
pub use io::parse_hmetis;
pub use partition::{ConnectivityIter, PartitionedHypergraph};
pub use refine::{FmResult, MultiTryKWayFm, SearchStats};
pub use types::{
    BlockId, EdgeId, EdgeWeight, Gain, NodeId, NodeWeight, SearchId, INVALID_BLOCK, INVALID_NODE,
};

pub mod metrics {
    //! Objective metrics over a partitioned hypergraph.
    pub use crate::objective::{cut, imbalance, is_balanced, km1, quality};
}
