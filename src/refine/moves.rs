use std::sync::atomic::{AtomicI64, AtomicU32, AtomicUsize, Ordering};

use crate::types::{BlockId, Gain, NodeId};

/// One committed vertex move, as recorded in the global move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub node: NodeId,
    pub from: BlockId,
    pub to: BlockId,
    /// Gain the search computed when it committed the move. Rollback
    /// re-derives the effective gain from current pin counts; this value
    /// is kept for diagnostics and the optimistic rollback path.
    pub gain: Gain,
}

/// Append-only log of all moves committed in one round, totally ordered
/// by sequence number.
///
/// Slot allocation is a single fetch-add; the fields live in parallel
/// atomic arrays so concurrent appends need no locking. A vertex moves at
/// most once per round (the tracker pins it to `MOVED`), so `num_nodes`
/// slots always suffice.
#[derive(Debug)]
pub(crate) struct MoveLog {
    node: Vec<AtomicU32>,
    from: Vec<AtomicU32>,
    to: Vec<AtomicU32>,
    gain: Vec<AtomicI64>,
    len: AtomicUsize,
}

impl MoveLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            node: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            from: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            to: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            gain: (0..capacity).map(|_| AtomicI64::new(0)).collect(),
            len: AtomicUsize::new(0),
        }
    }

    /// Record a move and return its sequence number.
    pub(crate) fn append(&self, m: Move) -> usize {
        let seq = self.len.fetch_add(1, Ordering::AcqRel);
        debug_assert!(seq < self.node.len(), "move log overflow");
        self.node[seq].store(m.node, Ordering::Relaxed);
        self.from[seq].store(m.from, Ordering::Relaxed);
        self.to[seq].store(m.to, Ordering::Relaxed);
        self.gain[seq].store(m.gain, Ordering::Relaxed);
        seq
    }

    /// Read the move with sequence number `seq`. Only meaningful after
    /// the round's searches have quiesced.
    pub(crate) fn get(&self, seq: usize) -> Move {
        debug_assert!(seq < self.len());
        Move {
            node: self.node[seq].load(Ordering::Relaxed),
            from: self.from[seq].load(Ordering::Relaxed),
            to: self.to[seq].load(Ordering::Relaxed),
            gain: self.gain[seq].load(Ordering::Relaxed),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.len.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_sequence() {
        let log = MoveLog::new(4);
        let m0 = Move { node: 5, from: 0, to: 1, gain: 3 };
        let m1 = Move { node: 6, from: 1, to: 0, gain: -2 };
        assert_eq!(log.append(m0), 0);
        assert_eq!(log.append(m1), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0), m0);
        assert_eq!(log.get(1), m1);
    }

    #[test]
    fn clear_resets_sequence() {
        let log = MoveLog::new(2);
        log.append(Move { node: 0, from: 0, to: 1, gain: 0 });
        log.clear();
        assert_eq!(log.len(), 0);
        assert_eq!(log.append(Move { node: 1, from: 1, to: 0, gain: 1 }), 0);
    }

    #[test]
    fn concurrent_appends_get_distinct_sequence_numbers() {
        let log = MoveLog::new(64);
        std::thread::scope(|scope| {
            let log = &log;
            for t in 0..4u32 {
                scope.spawn(move || {
                    for i in 0..16u32 {
                        log.append(Move { node: t * 16 + i, from: 0, to: 1, gain: 0 });
                    }
                });
            }
        });
        assert_eq!(log.len(), 64);

        let mut nodes: Vec<_> = (0..64).map(|seq| log.get(seq).node).collect();
        nodes.sort_unstable();
        assert_eq!(nodes, (0..64).collect::<Vec<_>>());
    }
}
