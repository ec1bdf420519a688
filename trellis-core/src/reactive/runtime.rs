//! Reactive Runtime
//!
//! The runtime decides what happens to a notification. When a producer
//! changes it hands its listeners to [`Runtime::dispatch`], which either:
//!
//! 1. drops them, inside [`untracked`];
//! 2. queues them, inside [`batch`];
//! 3. or calls them right away, in subscription order.
//!
//! # Batching
//!
//! A batch defers every notification to a single pending queue and drains
//! it when the batch body returns. The queue is keyed by listener identity
//! and ordered by rank, and the batch stays open while it drains, so work
//! caused by the flush (a computed telling its own listeners it changed)
//! joins the same queue. Each consumer therefore runs at most once per
//! flush, after every producer it reads has settled.
//!
//! Batches do not stack. A `batch` call made while one is already open,
//! including from a listener during the flush, just runs its body.
//!
//! # Thread Safety
//!
//! Batch state is thread-local, like the tracking stack. Each thread that
//! drives the graph has its own batch.

use std::cell::RefCell;

use super::context::ReactiveContext;
use super::registry::ListenerBatch;
use super::subscriber::{Listener, SubscriberId};
use crate::config;
use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, UpdateQueue};

#[derive(Default)]
struct BatchState {
    /// Whether a batch is open on this thread.
    active: bool,

    /// Depth of nested `untracked` calls. Notifications are dropped while
    /// this is non-zero.
    suppressed: usize,

    /// Listeners waiting for the batch to flush.
    pending: UpdateQueue<SubscriberId, Listener>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// What to do with a notification.
enum Route {
    Discard,
    Deferred,
    Immediate(ListenerBatch),
}

/// Entry points for the thread's batch controller.
pub struct Runtime;

impl Runtime {
    /// Deliver a change notification from `source` to `listeners`.
    pub(crate) fn dispatch(source: NodeId, listeners: ListenerBatch) {
        let route = BATCH.with(|state| {
            let mut state = state.borrow_mut();
            if state.suppressed > 0 {
                return Route::Discard;
            }
            if state.active {
                for listener in listeners {
                    let id = listener.id();
                    let rank = listener.rank();
                    if !state.pending.push(id, rank, listener) {
                        tracing::trace!(%source, subscriber = ?id, "listener already pending");
                    }
                }
                return Route::Deferred;
            }
            Route::Immediate(listeners)
        });

        match route {
            Route::Discard => {
                tracing::trace!(%source, "notification suppressed");
            }
            Route::Deferred => {}
            Route::Immediate(listeners) => {
                for listener in listeners {
                    listener.notify();
                }
            }
        }
    }

    /// Check if a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH.with(|state| state.borrow().active)
    }

    /// Check if notifications are currently being discarded.
    pub fn is_suppressed() -> bool {
        BATCH.with(|state| state.borrow().suppressed > 0)
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Number of listeners waiting for the current batch to flush.
    pub fn pending_count() -> usize {
        BATCH.with(|state| state.borrow().pending.len())
    }
}

/// Closes the batch when dropped, discarding anything still pending.
struct BatchGuard;

impl BatchGuard {
    fn open() -> Self {
        BATCH.with(|state| state.borrow_mut().active = true);
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        BATCH.with(|state| {
            let mut state = state.borrow_mut();
            state.active = false;
            state.pending.clear();
        });
    }
}

/// Keeps notifications suppressed for as long as it lives.
struct SuppressGuard;

impl SuppressGuard {
    fn new() -> Self {
        BATCH.with(|state| state.borrow_mut().suppressed += 1);
        SuppressGuard
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        BATCH.with(|state| state.borrow_mut().suppressed -= 1);
    }
}

/// Run `f` with notifications deferred, then deliver each pending
/// notification once.
///
/// Returns whatever `f` returns.
///
/// # Panics
///
/// Panics if the flush does not settle within the configured
/// `max_flush_steps`; see [`try_batch`] for a non-panicking variant.
pub fn batch<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    match try_batch(f) {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// Like [`batch`], but reports a flush that does not settle as an error.
///
/// When the error is returned the body has already run and its writes have
/// been applied; the notifications still pending are discarded.
pub fn try_batch<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    if Runtime::is_batching() {
        return Ok(f());
    }

    let _guard = BatchGuard::open();
    let value = f();
    flush(config::current().max_flush_steps)?;
    Ok(value)
}

fn flush(limit: usize) -> Result<()> {
    let mut steps = 0usize;
    tracing::debug!(pending = Runtime::pending_count(), "flushing batch");

    loop {
        let next = BATCH.with(|state| state.borrow_mut().pending.pop());
        let Some((queued_at, listener)) = next else {
            break;
        };

        // Re-ranked since it was queued: one of its producers now runs later.
        let rank = listener.rank();
        if rank > queued_at {
            tracing::trace!(subscriber = ?listener.id(), rank = rank.raw(), "listener re-queued");
            BATCH.with(|state| state.borrow_mut().pending.push(listener.id(), rank, listener));
            continue;
        }

        if steps == limit {
            tracing::warn!(limit, "batch flush did not settle; discarding pending notifications");
            return Err(ReactiveError::FlushLimitExceeded { limit });
        }
        steps += 1;

        listener.notify();
    }

    tracing::debug!(steps, "batch flushed");
    Ok(())
}

/// Run `f` without reactivity.
///
/// Reads inside `f` do not become dependencies of the computation that is
/// currently evaluating, and writes inside `f` notify nobody: their
/// notifications are discarded, not deferred.
pub fn untracked<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    let _ctx = ReactiveContext::untracked();
    let _quiet = SuppressGuard::new();
    f()
}
