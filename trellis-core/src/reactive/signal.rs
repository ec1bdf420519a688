//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! the set of listeners to call when that value changes.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking context (computed/effect),
//!    the signal records itself as a source of that computation.
//!
//! 2. When a signal's value is replaced, every listener is notified,
//!    immediately or at the end of the current batch.
//!
//! 3. Notifications trigger re-execution of dependent computations.
//!
//! Every write notifies, even when the new value equals the old one.
//!
//! # Thread Safety
//!
//! Signal handles are `Send + Sync`. The value is protected by a RwLock
//! and the listener set by the registry's mutex. Neither lock is held
//! while listeners run.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::registry::ListenerRegistry;
use super::subscriber::{Listener, Subscription};
use crate::graph::{NodeId, Rank};

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: NodeId,

    /// The current value, protected by RwLock for thread safety.
    value: Arc<RwLock<T>>,

    /// Listeners to notify on write.
    listeners: Arc<ListenerRegistry>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        let id = NodeId::new();
        Self {
            id,
            value: Arc::new(RwLock::new(value)),
            listeners: ListenerRegistry::new(id, Rank::SOURCE),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking context, this also records the signal
    /// as a source of the current computation.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.listeners);
        self.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value, tracking the read like [`Signal::get`].
    ///
    /// The value stays read-locked while `f` runs, so `f` must not write
    /// to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.listeners);
        f(&self.value.read())
    }

    /// Set a new value and notify listeners.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        tracing::trace!(signal = %self.id, "signal written");
        self.listeners.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// Register a listener, called with no arguments after every write.
    ///
    /// Subscribing the same [`Listener`] twice registers it once.
    pub fn subscribe(&self, listener: impl Into<Listener>) -> Subscription {
        self.listeners.subscribe(listener.into())
    }

    /// Get the number of listeners, including dependent computations.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
