//! Computed Implementation
//!
//! A Computed is a cached derived value that is kept up to date eagerly:
//! it recomputes as soon as one of its sources changes, not when it is
//! next read.
//!
//! # How Computeds Work
//!
//! 1. On construction, the derivation runs inside a tracking context. Every
//!    producer it reads becomes a source.
//!
//! 2. One recompute listener is subscribed to all of those sources. Because
//!    it is the same listener everywhere, a batch that changes several
//!    sources runs it once.
//!
//! 3. When it runs, the derivation is evaluated again, the cached value is
//!    replaced and the computed's own listeners are notified.
//!
//! 4. Reading a computed returns the cached value; it never recomputes on
//!    read.
//!
//! # Re-tracking
//!
//! With [`TrackingMode::Static`] the sources found by the first evaluation
//! are kept for the computed's whole life. With [`TrackingMode::Dynamic`]
//! each evaluation re-discovers them.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::context::ReactiveContext;
use super::registry::ListenerRegistry;
use super::subscriber::{Listener, SourceSet, SubscriberId, Subscription};
use crate::config::{self, TrackingMode};
use crate::graph::{NodeId, Rank};

struct ComputedInner<T> {
    id: NodeId,

    /// The derivation.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value.
    value: RwLock<T>,

    /// Listeners of this computed.
    listeners: Arc<ListenerRegistry>,

    /// The recompute listener, shared by every source subscription.
    recompute: Listener,

    /// The producers the recompute listener is subscribed to.
    sources: Mutex<SourceSet>,

    tracking: TrackingMode,
    recomputes: AtomicUsize,
    disposed: AtomicBool,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn recompute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let value = match self.tracking {
            // Listeners run untracked, so static reads leak nowhere.
            TrackingMode::Static => (self.compute)(),
            TrackingMode::Dynamic => {
                let ctx = ReactiveContext::enter(self.recompute.id());
                let value = (self.compute)();
                let found = ctx.finish();

                if !self.disposed.load(Ordering::SeqCst) {
                    self.sources.lock().retrack(&self.recompute, &found);
                }
                value
            }
        };

        *self.value.write() = value;
        let count = self.recomputes.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(computed = %self.id, recomputes = count, "computed re-evaluated");

        self.listeners.notify();
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.sources.get_mut().detach_all();
    }
}

/// A derived value recomputed whenever one of its sources changes.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(10);
/// let doubled = {
///     let count = count.clone();
///     Computed::new(move || count.get() * 2)
/// };
/// assert_eq!(doubled.get(), 20);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed using the configured default tracking mode.
    ///
    /// The derivation runs immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_tracking(config::current().tracking, compute)
    }

    /// Create a computed with an explicit tracking mode.
    pub fn with_tracking<F>(tracking: TrackingMode, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let subscriber_id = SubscriberId::new();

        let ctx = ReactiveContext::enter(subscriber_id);
        let initial = compute();
        let found = ctx.finish();

        let rank = Rank::above(found.iter().map(|source| source.rank()));
        let id = NodeId::new();

        let listeners = ListenerRegistry::new(id, rank);

        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            ComputedInner {
                id,
                compute: Box::new(compute),
                value: RwLock::new(initial),
                recompute: Listener::producing(subscriber_id, &listeners, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.recompute();
                    }
                }),
                listeners,
                sources: Mutex::new(SourceSet::default()),
                tracking,
                recomputes: AtomicUsize::new(0),
                disposed: AtomicBool::new(false),
            }
        });

        inner.sources.lock().attach(&inner.recompute, &found);
        tracing::trace!(computed = %id, sources = found.len(), ?tracking, "computed created");

        Self { inner }
    }

    /// Get the computed's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the cached value.
    ///
    /// If called within a tracking context, this also records the computed
    /// as a source of the current computation.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.inner.listeners);
        self.inner.value.read().clone()
    }

    /// Get the cached value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the cached value, tracking the read like [`Computed::get`].
    ///
    /// The value stays read-locked while `f` runs, so `f` must not write to
    /// anything this computed depends on.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner.listeners);
        f(&self.inner.value.read())
    }

    /// Register a listener, called after every recompute.
    pub fn subscribe(&self, listener: impl Into<Listener>) -> Subscription {
        self.inner.listeners.subscribe(listener.into())
    }

    /// Stop following the sources. The cached value is frozen.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.sources.lock().detach_all();
        tracing::debug!(computed = %self.inner.id, "computed disposed");
    }

    /// Check if the computed has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Number of re-evaluations since construction.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputes.load(Ordering::Relaxed)
    }

    /// Number of producers currently followed.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// The tracking mode chosen at construction.
    pub fn tracking(&self) -> TrackingMode {
        self.inner.tracking
    }

    /// Get the number of listeners, including dependent computations.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("recomputes", &self.recompute_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
