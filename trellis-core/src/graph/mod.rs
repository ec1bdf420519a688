//! Dependency Graph
//!
//! Graph-level building blocks shared by the reactive primitives.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (signals, computeds) or effects
//! - Edges represent dependencies: if A reads B, there is an edge from B to A
//!
//! The edges themselves are not stored centrally. Each producer owns a
//! registry of the listeners subscribed to it, and each consumer owns the
//! subscriptions it holds. What lives here is what the whole graph agrees
//! on: node identity, ranks, and the order in which deferred work runs.
//!
//! # Design Decisions
//!
//! 1. Ranks instead of a global topological sort. A consumer's rank is
//!    computed once from its sources, so ordering a batch costs a map
//!    insertion per notification instead of a sort per flush.
//!
//! 2. Deduplication by listener identity. A consumer subscribes the same
//!    listener to every source, so the pending queue coalesces repeated
//!    notifications without counting them.

mod node;
mod scheduler;

pub use node::{NodeId, Rank};
pub use scheduler::UpdateQueue;
