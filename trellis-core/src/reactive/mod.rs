//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds and
//! effects, plus the batch controller that coordinates their updates.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect being evaluated),
//! the signal records itself as a source of that computation. When the
//! signal's value changes, all of its listeners are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates as
//! soon as one of its sources changes and then notifies its own listeners,
//! so it is both a consumer and a producer.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that reruns whenever its
//! sources change. Effects synchronize reactive state with external systems.
//!
//! ## Batches
//!
//! [`batch`] defers notifications until its body returns and then delivers
//! each one once, in rank order, so shared dependents see a consistent
//! state. [`untracked`] runs code with both tracking and notifications
//! switched off.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to detect
//! dependencies automatically. When a producer is read, we check if there
//! is an active tracking frame and, if so, record the producer in it.
//!
//! Graphs must be acyclic. A listener that ends up notifying itself recurses
//! without bound outside a batch, and trips the flush limit inside one.

mod context;
mod subscriber;
mod registry;
mod signal;
mod computed;
mod effect;
mod runtime;

pub use context::ReactiveContext;
pub use subscriber::{Listener, SubscriberId, Subscription};
pub use registry::ListenerRegistry;
pub use signal::Signal;
pub use computed::Computed;
pub use effect::Effect;
pub use runtime::{batch, try_batch, untracked, Runtime};
