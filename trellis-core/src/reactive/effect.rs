//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to discover
//!    its dependencies.
//!
//! 2. A single rerun listener is subscribed to every dependency, so a batch
//!    that changes several of them reruns the effect once.
//!
//! 3. When any dependency changes, the function runs again. Its return
//!    value, if any, is discarded.
//!
//! # Differences from Computed
//!
//! - Computeds hold a value and have listeners of their own; effects do not.
//! - Both are eager: they run as soon as their sources change.
//!
//! # Lifetime
//!
//! The effect body is owned by its subscriptions, not by the [`Effect`]
//! handle: dropping the handle leaves the effect running for as long as its
//! sources exist. Call [`Effect::dispose`] to stop it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::{Listener, SourceSet, SubscriberId, WeakListener};
use crate::config::{self, TrackingMode};
use crate::graph::Rank;

struct EffectCore {
    id: SubscriberId,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    /// The rerun listener. Held weakly: the sources own it.
    listener: OnceLock<WeakListener>,

    /// The producers the rerun listener is subscribed to.
    sources: Mutex<SourceSet>,

    tracking: TrackingMode,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

impl EffectCore {
    fn execute(&self) {
        (self.run)();
        let runs = self.run_count.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(effect = ?self.id, runs, "effect ran");
    }

    fn rerun(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let listener = match self.tracking {
            TrackingMode::Static => None,
            TrackingMode::Dynamic => self.listener.get().and_then(WeakListener::upgrade),
        };

        // Listeners run untracked, so a static rerun records nothing.
        let Some(listener) = listener else {
            self.execute();
            return;
        };

        let ctx = ReactiveContext::enter(self.id);
        self.execute();
        let found = ctx.finish();

        if !self.disposed.load(Ordering::SeqCst) {
            self.sources.lock().retrack(&listener, &found);
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let log = Arc::new(Mutex::new(Vec::new()));
///
/// let effect = {
///     let (count, log) = (count.clone(), log.clone());
///     Effect::new(move || log.lock().unwrap().push(count.get()))
/// };
///
/// count.set(5);
/// effect.dispose();
/// count.set(6);
///
/// assert_eq!(*log.lock().unwrap(), vec![0, 5]);
/// ```
#[derive(Clone)]
pub struct Effect {
    core: Arc<EffectCore>,
}

impl Effect {
    /// Create an effect using the configured default tracking mode.
    ///
    /// The function runs immediately to establish dependencies.
    pub fn new<F, R>(run: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: 'static,
    {
        Self::with_tracking(config::current().tracking, run)
    }

    /// Create an effect with an explicit tracking mode.
    pub fn with_tracking<F, R>(tracking: TrackingMode, run: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: 'static,
    {
        let id = SubscriberId::new();
        let core = Arc::new(EffectCore {
            id,
            run: Box::new(move || {
                let _ = run();
            }),
            listener: OnceLock::new(),
            sources: Mutex::new(SourceSet::default()),
            tracking,
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
        });

        let ctx = ReactiveContext::enter(id);
        core.execute();
        let found = ctx.finish();

        let rank = Rank::above(found.iter().map(|source| source.rank()));
        let listener = {
            let core = Arc::clone(&core);
            Listener::ranked(id, rank, move || core.rerun())
        };
        let _ = core.listener.set(listener.downgrade());
        core.sources.lock().attach(&listener, &found);

        tracing::trace!(effect = ?id, sources = found.len(), ?tracking, "effect created");
        Self { core }
    }

    /// Get the effect's subscriber ID.
    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    /// Stop the effect: unsubscribe from every dependency and never run
    /// again. Calling it more than once is harmless.
    pub fn dispose(&self) {
        if self.core.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.sources.lock().detach_all();
        tracing::debug!(effect = ?self.core.id, "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run, including the first run.
    pub fn run_count(&self) -> usize {
        self.core.run_count.load(Ordering::Relaxed)
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.core.sources.lock().len()
    }

    /// The tracking mode chosen at construction.
    pub fn tracking(&self) -> TrackingMode {
        self.core.tracking
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.core.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
