mod localized;
mod moves;
mod multitry;
mod queues;
mod rollback;
mod seeds;
mod shared;
mod tracker;

pub(crate) use queues::{BlockQueue, PqHandles, VertexQueue};
pub(crate) use seeds::SeedQueue;
pub(crate) use shared::FmSharedData;
pub(crate) use tracker::NodeTracker;

pub use localized::SearchStats;
pub use multitry::{FmResult, MultiTryKWayFm};
pub(crate) use moves::{Move, MoveLog};
