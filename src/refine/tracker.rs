use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{NodeId, SearchId};

/// No search holds the vertex.
pub(crate) const UNCLAIMED: SearchId = 0;

/// The vertex was moved this round; it stays unavailable until the round
/// ends so no later search can move it again before rollback has run.
pub(crate) const MOVED: SearchId = SearchId::MAX;

/// Cross-thread reservation of vertices: at most one active search per
/// vertex. Reservation is a CAS from `UNCLAIMED` to the search id, so two
/// searches can never expand into the same vertex.
#[derive(Debug)]
pub(crate) struct NodeTracker {
    owner: Vec<AtomicU32>,
    last_search_id: AtomicU32,
}

impl NodeTracker {
    pub(crate) fn new(num_nodes: usize) -> Self {
        Self {
            owner: (0..num_nodes).map(|_| AtomicU32::new(UNCLAIMED)).collect(),
            last_search_id: AtomicU32::new(UNCLAIMED),
        }
    }

    /// Mint a fresh search id, distinct from every other id this round.
    pub(crate) fn mint_search_id(&self) -> SearchId {
        let id = self.last_search_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug_assert!(id != MOVED, "search ids exhausted");
        id
    }

    #[inline]
    pub(crate) fn owner(&self, v: NodeId) -> SearchId {
        self.owner[v as usize].load(Ordering::Relaxed)
    }

    /// Try to reserve `v` for search `sid`. Fails iff some search already
    /// holds `v` or `v` was moved this round.
    pub(crate) fn try_reserve(&self, v: NodeId, sid: SearchId) -> bool {
        debug_assert!(sid != UNCLAIMED && sid != MOVED);
        self.owner[v as usize]
            .compare_exchange(UNCLAIMED, sid, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Hand `v` back; a later search may reserve it again.
    pub(crate) fn release(&self, v: NodeId) {
        self.owner[v as usize].store(UNCLAIMED, Ordering::Release);
    }

    /// Mark `v` as moved; it stays reserved until the round ends.
    pub(crate) fn mark_moved(&self, v: NodeId) {
        self.owner[v as usize].store(MOVED, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_moved(&self, v: NodeId) -> bool {
        self.owner(v) == MOVED
    }

    /// Forget all reservations and restart search ids. Between rounds only.
    pub(crate) fn reset(&self) {
        for owner in &self.owner {
            owner.store(UNCLAIMED, Ordering::Relaxed);
        }
        self.last_search_id.store(UNCLAIMED, Ordering::Relaxed);
    }
}
