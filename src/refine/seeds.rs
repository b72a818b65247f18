use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::types::NodeId;

/// Work queue of seed vertices, sharded per worker.
///
/// A round has two non-overlapping phases: a fill phase (concurrent
/// pushes, no pops) and a drain phase (concurrent pops, no pushes).
/// Workers pop from their own shard first and steal from the fullest
/// other shard once it runs dry.
#[derive(Debug)]
pub(crate) struct SeedQueue {
    shards: Vec<Shard>,
}

#[derive(Debug)]
struct Shard {
    items: Vec<AtomicU32>,
    len: AtomicUsize,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Self {
            items: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            len: AtomicUsize::new(0),
        }
    }

    fn push(&self, v: NodeId) {
        let slot = self.len.fetch_add(1, Ordering::AcqRel);
        debug_assert!(slot < self.items.len(), "seed shard overflow");
        self.items[slot].store(v, Ordering::Release);
    }

    fn try_pop(&self) -> Option<NodeId> {
        let mut len = self.len.load(Ordering::Acquire);
        loop {
            if len == 0 {
                return None;
            }
            match self.len.compare_exchange_weak(len, len - 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Some(self.items[len - 1].load(Ordering::Acquire)),
                Err(observed) => len = observed,
            }
        }
    }
}

impl SeedQueue {
    /// Create `num_shards` shards able to hold all of `0..num_nodes`
    /// together; vertex `v` always lands in shard `v % num_shards`, which
    /// bounds every shard's fill.
    pub(crate) fn new(num_shards: usize, num_nodes: usize) -> Self {
        assert!(num_shards > 0, "need at least one shard");
        let capacity = num_nodes / num_shards + 1;
        Self {
            shards: (0..num_shards).map(|_| Shard::new(capacity)).collect(),
        }
    }

    pub(crate) fn push(&self, v: NodeId) {
        self.shards[v as usize % self.shards.len()].push(v);
    }

    /// Pop from `preferred`'s shard, stealing from the fullest other
    /// shard if it is empty. Returns `None` once all shards are drained.
    pub(crate) fn try_pop(&self, preferred: usize) -> Option<NodeId> {
        if let Some(v) = self.shards[preferred % self.shards.len()].try_pop() {
            return Some(v);
        }
        let fullest = (0..self.shards.len())
            .max_by_key(|&i| self.shards[i].len.load(Ordering::Acquire))?;
        self.shards[fullest].try_pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len.load(Ordering::Acquire)).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        for shard in &self.shards {
            shard.len.store(0, Ordering::Release);
        }
    }

    /// Sort each shard's contents. Parallel pushes land in racy order;
    /// sorting gives every round the same drain order for a fixed seed
    /// set and thread count. Requires exclusive access.
    pub(crate) fn sort(&mut self) {
        for shard in &mut self.shards {
            let len = *shard.len.get_mut();
            let filled = &mut shard.items[..len];
            let mut values: Vec<u32> = filled.iter_mut().map(|slot| *slot.get_mut()).collect();
            values.sort_unstable();
            for (slot, v) in filled.iter_mut().zip(values) {
                *slot.get_mut() = v;
            }
        }
    }

    /// Shuffle each shard's contents with a deterministic per-shard RNG
    /// (after sorting away the racy push order). Requires exclusive
    /// access, i.e. runs between fill and drain.
    pub(crate) fn shuffle(&mut self, seed: u64) {
        self.sort();
        for (i, shard) in self.shards.iter_mut().enumerate() {
            let len = *shard.len.get_mut();
            let mut rng = StdRng::seed_from_u64(seed ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            let filled = &mut shard.items[..len];
            let mut values: Vec<u32> = filled.iter_mut().map(|slot| *slot.get_mut()).collect();
            values.shuffle(&mut rng);
            for (slot, v) in filled.iter_mut().zip(values) {
                *slot.get_mut() = v;
            }
        }
    }
}
