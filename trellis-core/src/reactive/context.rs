//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a producer is read,
//! it records itself in the current computation's frame, and the
//! computation subscribes to everything it collected once it finishes.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a computation pushes a
//! tracking frame; [`ReactiveContext::untracked`] pushes a frame that
//! records nothing. Frames are popped when their guard is dropped or
//! finished, so the stack stays balanced even if the computation panics.
//!
//! The stack supports nested contexts: a computed created while an effect
//! is evaluating tracks its own reads without touching the effect's frame.

use std::cell::RefCell;
use std::sync::Arc;

use smallvec::SmallVec;

use super::registry::ListenerRegistry;
use super::SubscriberId;
use crate::graph::NodeId;

/// Producers collected by one tracking frame, in first-read order.
pub(crate) type Sources = SmallVec<[Arc<ListenerRegistry>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
enum Frame {
    /// A computation collecting the producers it reads.
    Tracking {
        subscriber_id: SubscriberId,
        sources: Sources,
    },
    /// A region where reads create no dependencies.
    Untracked,
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    popped: bool,
}

impl ReactiveContext {
    /// Enter a new tracking context for the given subscriber.
    ///
    /// While this context is on top of the stack, every producer that is
    /// read is recorded as a source of the subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame::Tracking {
                subscriber_id,
                sources: Sources::new(),
            });
        });

        Self {
            subscriber_id: Some(subscriber_id),
            popped: false,
        }
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Frame::Untracked));

        Self {
            subscriber_id: None,
            popped: false,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Frame::Tracking { .. })))
    }

    /// Get the subscriber whose reads are being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last() {
            Some(Frame::Tracking { subscriber_id, .. }) => Some(*subscriber_id),
            _ => None,
        })
    }

    /// Record a read of the given producer.
    ///
    /// Called by signals and computeds when they are read. A producer read
    /// several times in one frame is recorded once.
    pub fn track(source: &Arc<ListenerRegistry>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(Frame::Tracking { sources, .. }) = stack.borrow_mut().last_mut() {
                if !sources.iter().any(|known| known.node_id() == source.node_id()) {
                    sources.push(Arc::clone(source));
                }
            }
        });
    }

    /// The producers recorded so far in the current frame.
    pub fn dependencies() -> Vec<NodeId> {
        CONTEXT_STACK.with(|stack| match stack.borrow().last() {
            Some(Frame::Tracking { sources, .. }) => {
                sources.iter().map(|source| source.node_id()).collect()
            }
            _ => Vec::new(),
        })
    }

    /// Leave the context, returning the producers it recorded.
    pub(crate) fn finish(mut self) -> Sources {
        self.popped = true;
        match self.pop() {
            Some(Frame::Tracking { sources, .. }) => sources,
            _ => Sources::new(),
        }
    }

    fn pop(&self) -> Option<Frame> {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(frame) = &popped {
            let found = match frame {
                Frame::Tracking { subscriber_id, .. } => Some(*subscriber_id),
                Frame::Untracked => None,
            };
            debug_assert_eq!(
                found, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, found
            );
        }

        popped
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.popped {
            self.pop();
        }
    }
}
