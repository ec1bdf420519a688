//! Subscriber types for the reactive system.
//!
//! A [`Listener`] is a callback with a stable identity. Producers keep their
//! listeners in a set keyed by that identity, so subscribing the same
//! listener twice is harmless, and the batch scheduler uses the same
//! identity to run a listener once per flush.
//!
//! A [`Subscription`] is the token returned by `subscribe`. Calling
//! [`Subscription::unsubscribe`] removes the listener; calling it again does
//! nothing. Dropping the token does not unsubscribe.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::registry::ListenerRegistry;
use crate::graph::{NodeId, Rank};

/// Unique identifier for a subscriber.
///
/// Each listener gets a unique ID when created. This ID is used to
/// deduplicate subscriptions and pending notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

struct ListenerInner {
    id: SubscriberId,
    rank: AtomicU32,
    notify: Box<dyn Fn() + Send + Sync>,

    /// Registry of the computed this listener recomputes, if any. Rank
    /// changes are pushed through it to downstream consumers.
    output: Option<Weak<ListenerRegistry>>,
}

/// A callback subscribed to one or more producers.
///
/// Cloning a listener keeps its identity: every clone is the same
/// subscriber as far as registries and batches are concerned.
#[derive(Clone)]
pub struct Listener {
    inner: Arc<ListenerInner>,
}

impl Listener {
    /// Create a plain listener.
    ///
    /// Plain listeners rank after every computed and effect, so inside a
    /// batch they observe fully settled values.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::ranked(SubscriberId::new(), Rank::TERMINAL, notify)
    }

    pub(crate) fn ranked<F>(id: SubscriberId, rank: Rank, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(id, rank, None, notify)
    }

    /// A listener that recomputes the producer owning `output`. It shares
    /// that producer's rank.
    pub(crate) fn producing<F>(id: SubscriberId, output: &Arc<ListenerRegistry>, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(id, output.rank(), Some(Arc::downgrade(output)), notify)
    }

    fn build<F>(id: SubscriberId, rank: Rank, output: Option<Weak<ListenerRegistry>>, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ListenerInner {
                id,
                rank: AtomicU32::new(rank.raw()),
                notify: Box::new(notify),
                output,
            }),
        }
    }

    /// Get the listener's identity.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Get the listener's scheduling rank.
    pub fn rank(&self) -> Rank {
        Rank::from(self.inner.rank.load(Ordering::Relaxed))
    }

    fn set_rank(&self, rank: Rank) {
        self.inner.rank.store(rank.raw(), Ordering::Relaxed);
    }

    /// Move the listener up to `rank`, along with everything downstream of
    /// the producer it recomputes. Ranks never go down.
    pub(crate) fn raise_rank(&self, rank: Rank) {
        if self.rank() >= rank {
            return;
        }
        self.set_rank(rank);
        if let Some(output) = self.inner.output.as_ref().and_then(Weak::upgrade) {
            output.raise_rank(rank);
        }
    }

    /// Invoke the callback.
    ///
    /// The callback runs in an untracked frame: whatever it reads is not
    /// recorded as a dependency of the computation that triggered it.
    pub fn notify(&self) {
        let _ctx = ReactiveContext::untracked();
        (self.inner.notify)();
    }

    pub(crate) fn downgrade(&self) -> WeakListener {
        WeakListener {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<F> From<F> for Listener
where
    F: Fn() + Send + Sync + 'static,
{
    fn from(notify: F) -> Self {
        Listener::new(notify)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id())
            .field("rank", &self.rank())
            .finish()
    }
}

/// A listener reference that does not keep the callback alive.
#[derive(Clone)]
pub(crate) struct WeakListener {
    inner: Weak<ListenerInner>,
}

impl WeakListener {
    pub(crate) fn upgrade(&self) -> Option<Listener> {
        self.inner.upgrade().map(|inner| Listener { inner })
    }
}

/// Token that removes a listener from a producer.
#[derive(Clone)]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    subscriber: SubscriberId,
}

impl Subscription {
    pub(crate) fn new(registry: &Arc<ListenerRegistry>, subscriber: SubscriberId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            subscriber,
        }
    }

    /// Remove the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.subscriber);
        }
    }

    /// Whether the listener is still registered with a live producer.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.subscriber))
    }

    /// The subscribed listener's identity.
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber)
            .field("active", &self.is_active())
            .finish()
    }
}

/// The producers a consumer is currently subscribed to.
#[derive(Debug, Default)]
pub(crate) struct SourceSet {
    entries: SmallVec<[(NodeId, Subscription); 4]>,
}

impl SourceSet {
    /// Subscribe `listener` to every registry in `sources`.
    ///
    /// Returns the rank the consumer should take.
    pub(crate) fn attach(&mut self, listener: &Listener, sources: &[Arc<ListenerRegistry>]) -> Rank {
        for source in sources {
            if !self.contains(source.node_id()) {
                let subscription = source.subscribe(listener.clone());
                self.entries.push((source.node_id(), subscription));
            }
        }
        Rank::above(sources.iter().map(|source| source.rank()))
    }

    /// Make the subscribed set equal to `sources`.
    ///
    /// Producers no longer read are unsubscribed and new ones subscribed.
    /// If a new source outranks the listener, the listener and its
    /// downstream consumers are raised above it.
    pub(crate) fn retrack(&mut self, listener: &Listener, sources: &[Arc<ListenerRegistry>]) -> Rank {
        let before = self.entries.len();
        self.entries.retain(|(node, subscription)| {
            let still_read = sources.iter().any(|source| source.node_id() == *node);
            if !still_read {
                subscription.unsubscribe();
            }
            still_read
        });
        let dropped = before - self.entries.len();

        let kept = self.entries.len();
        let rank = self.attach(listener, sources);
        let added = self.entries.len() - kept;

        if dropped > 0 || added > 0 {
            tracing::debug!(
                subscriber = ?listener.id(),
                added,
                dropped,
                "dependencies changed on re-evaluation"
            );
        }

        listener.raise_rank(rank);
        listener.rank()
    }

    /// Unsubscribe from everything.
    pub(crate) fn detach_all(&mut self) {
        for (_, subscription) in self.entries.drain(..) {
            subscription.unsubscribe();
        }
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.entries.iter().any(|(id, _)| *id == node)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
