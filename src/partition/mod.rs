mod connectivity;
mod partitioned;
mod pin_counts;

pub(crate) use connectivity::ConnectivitySet;
pub(crate) use pin_counts::PinCountTable;

pub use connectivity::ConnectivityIter;
pub use partitioned::PartitionedHypergraph;
