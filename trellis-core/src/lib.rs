//! Trellis Core
//!
//! This crate provides a fine-grained reactive state engine. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Automatic dependency tracking
//! - Batched, glitch-free change propagation
//!
//! Every operation is synchronous: a write returns only after every
//! computed and effect it affects has been brought up to date.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives, dependency tracking and batching
//! - `graph`: Node identity, ranks and the batch update queue
//! - `config`: Process-wide engine settings
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use trellis_core::reactive::{batch, Computed, Effect, Signal};
//!
//! // Create a signal
//! let count = Signal::new(1);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Computed::new(move || count.get() * 2)
//! };
//!
//! // Create an effect
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let _effect = {
//!     let (count, doubled, seen) = (count.clone(), doubled.clone(), seen.clone());
//!     Effect::new(move || seen.lock().unwrap().push((count.get(), doubled.get())))
//! };
//!
//! // Update the signal twice; the effect runs once with settled values
//! batch(|| {
//!     count.set(4);
//!     count.set(5);
//! });
//!
//! assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (5, 10)]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::{ReactiveConfig, TrackingMode};
pub use error::{ReactiveError, Result};
