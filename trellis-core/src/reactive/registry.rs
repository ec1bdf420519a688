//! Listener Registry
//!
//! Every producer (signal or computed) owns one registry: the ordered set of
//! listeners to call when its value changes. Entries are keyed by listener
//! identity, which keeps the set free of duplicates and makes removal
//! idempotent.
//!
//! The registry also carries the producer's identity and rank so that a
//! consumer can subscribe to, and rank itself above, whatever it read
//! without knowing the producer's value type.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::runtime::Runtime;
use super::subscriber::{Listener, SubscriberId, Subscription};
use crate::graph::{NodeId, Rank};

/// Listeners captured for one notification.
pub(crate) type ListenerBatch = SmallVec<[Listener; 4]>;

/// The set of listeners subscribed to one producer.
pub struct ListenerRegistry {
    node: NodeId,
    rank: AtomicU32,
    listeners: Mutex<IndexMap<SubscriberId, Listener>>,
}

impl ListenerRegistry {
    /// Create an empty registry for the given producer.
    pub fn new(node: NodeId, rank: Rank) -> Arc<Self> {
        Arc::new(Self {
            node,
            rank: AtomicU32::new(rank.raw()),
            listeners: Mutex::new(IndexMap::new()),
        })
    }

    /// The producer this registry belongs to.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The producer's rank.
    pub fn rank(&self) -> Rank {
        Rank::from(self.rank.load(Ordering::Relaxed))
    }

    /// Raise the producer to `rank` and re-rank every consumer that reads
    /// it so each still sits above it.
    pub(crate) fn raise_rank(&self, rank: Rank) {
        if self.rank() >= rank {
            return;
        }
        self.rank.store(rank.raw(), Ordering::Relaxed);
        tracing::trace!(node = %self.node, rank = rank.raw(), "producer re-ranked");

        let above = Rank::above([rank]);
        for listener in self.snapshot() {
            listener.raise_rank(above);
        }
    }

    /// Add a listener. A listener that is already present keeps its
    /// original position.
    pub fn subscribe(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = listener.id();
        self.listeners.lock().entry(id).or_insert(listener);
        Subscription::new(self, id)
    }

    /// Remove a listener. Returns whether it was present.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }

    /// Whether the listener is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.listeners.lock().contains_key(&id)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Copy the current listeners, in subscription order.
    ///
    /// The lock is released before any listener runs, so listeners may
    /// subscribe, unsubscribe and write freely.
    pub(crate) fn snapshot(&self) -> ListenerBatch {
        self.listeners.lock().values().cloned().collect()
    }

    /// Tell every listener the producer changed.
    pub fn notify(&self) {
        let listeners = self.snapshot();
        if listeners.is_empty() {
            return;
        }
        Runtime::dispatch(self.node, listeners);
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("node", &self.node)
            .field("rank", &self.rank())
            .field("listeners", &self.len())
            .finish()
    }
}
