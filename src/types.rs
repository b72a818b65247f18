/// Dense vertex identifier in `0..num_nodes`.
pub type NodeId = u32;

/// Dense hyperedge identifier in `0..num_edges`.
pub type EdgeId = u32;

/// Block (part) identifier in `0..k`.
pub type BlockId = u32;

/// Integer vertex weight.
pub type NodeWeight = i64;

/// Integer hyperedge weight.
pub type EdgeWeight = i64;

/// Signed gain of a vertex move. Kept at 64 bits so sums of edge weights
/// cannot overflow even when inputs carry 32-bit weights.
pub type Gain = i64;

/// Identifier of a localized search; minted per round by the node tracker.
pub type SearchId = u32;

/// Sentinel for "not assigned to any block".
pub const INVALID_BLOCK: BlockId = u32::MAX;

/// Sentinel for "no such vertex".
pub const INVALID_NODE: NodeId = u32::MAX;

/// Smallest representable gain; used as the key of vertices that currently
/// have no feasible destination block.
pub const GAIN_MIN: Gain = i64::MIN;

/// Vertices with a degree above this threshold get their gain cache entries
/// computed with a parallel reduction over their incident edges, and are
/// never considered border nodes by the FM search.
pub const HIGH_DEGREE_THRESHOLD: usize = 100_000;
