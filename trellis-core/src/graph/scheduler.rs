//! Update Scheduler
//!
//! The scheduler holds the work deferred by a batch and decides the order in
//! which it runs. It ensures that producers are always updated before the
//! consumers that read them.
//!
//! # Algorithm
//!
//! Pending work is keyed by identity and ordered by `(rank, arrival)`:
//!
//! 1. Pushing an item that is already pending is a no-op, so a consumer fed
//!    by several producers that all changed in one batch is queued once.
//! 2. Popping always returns the lowest-ranked pending item, ties broken by
//!    arrival order.
//! 3. Once an item has been popped it is no longer pending, so a later push
//!    (caused by something that changed after it ran) queues it again.
//!
//! Because a consumer's rank is strictly above every producer it reads, by
//! the time it is popped all of its producers that were going to change in
//! this flush already have. This is what rules out glitches in diamond
//! shaped graphs.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::node::Rank;

/// Rank-ordered, identity-deduplicated queue of pending work.
#[derive(Debug)]
pub struct UpdateQueue<K, T> {
    /// Pending items in run order.
    entries: BTreeMap<(Rank, u64), (K, T)>,

    /// Position of each pending key in `entries`.
    queued: HashMap<K, (Rank, u64)>,

    /// Arrival counter used to break rank ties.
    arrivals: u64,
}

impl<K, T> UpdateQueue<K, T>
where
    K: Copy + Eq + Hash,
{
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            queued: HashMap::new(),
            arrivals: 0,
        }
    }

    /// Queue `item` under `key` at the given rank.
    ///
    /// Returns `false` if `key` was already pending, in which case the
    /// queue is left untouched.
    pub fn push(&mut self, key: K, rank: Rank, item: T) -> bool {
        if self.queued.contains_key(&key) {
            return false;
        }

        let slot = (rank, self.arrivals);
        self.arrivals += 1;
        self.queued.insert(key, slot);
        self.entries.insert(slot, (key, item));
        true
    }

    /// Remove and return the next item to run, with the rank it was
    /// queued at.
    pub fn pop(&mut self) -> Option<(Rank, T)> {
        let ((rank, _), (key, item)) = self.entries.pop_first()?;
        self.queued.remove(&key);
        Some((rank, item))
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.queued.clear();
    }
}

impl<K, T> Default for UpdateQueue<K, T>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut UpdateQueue<u32, &'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| queue.pop().map(|(_, item)| item)).collect()
    }

    #[test]
    fn duplicate_keys_are_queued_once() {
        let mut queue = UpdateQueue::new();

        assert!(queue.push(1, Rank::from(1), "first"));
        assert!(!queue.push(1, Rank::from(1), "again"));
        assert!(queue.push(2, Rank::from(1), "second"));

        assert_eq!(queue.len(), 2);
        assert_eq!(drain(&mut queue), vec!["first", "second"]);
    }

    #[test]
    fn lower_ranks_run_first() {
        let mut queue = UpdateQueue::new();

        queue.push(10, Rank::TERMINAL, "listener");
        queue.push(11, Rank::from(2), "sum");
        queue.push(12, Rank::from(1), "double");
        queue.push(13, Rank::from(1), "increment");

        assert_eq!(drain(&mut queue), vec!["double", "increment", "sum", "listener"]);
    }

    #[test]
    fn popped_keys_can_be_queued_again() {
        let mut queue = UpdateQueue::new();

        queue.push(7, Rank::from(1), "run");
        assert!(!queue.push(7, Rank::from(1), "dup"));
        assert_eq!(queue.pop(), Some((Rank::from(1), "run")));

        assert!(queue.push(7, Rank::from(4), "rerun"));
        assert_eq!(queue.pop(), Some((Rank::from(4), "rerun")));
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_forgets_pending_keys() {
        let mut queue = UpdateQueue::new();
        queue.push(1, Rank::from(1), "a");
        queue.push(2, Rank::from(2), "b");

        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.push(1, Rank::from(1), "a"));
    }
}
