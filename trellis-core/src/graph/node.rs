//! Graph Nodes
//!
//! This module defines node identity and ranks.
//!
//! A rank is the topological height of a node. Signals sit at rank zero,
//! a consumer sits one rank above the highest-ranked producer it reads, and
//! plain listeners (callbacks with no reactive output) sit at the top. The
//! batch scheduler drains pending work lowest rank first, which guarantees
//! that a consumer never runs before a producer it reads has settled.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a producer node (signal or computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Topological height of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rank(u32);

impl Rank {
    /// Rank of every signal.
    pub const SOURCE: Rank = Rank(0);

    /// Rank of plain listeners. They run after all reactive work.
    pub const TERMINAL: Rank = Rank(u32::MAX);

    /// The rank of a consumer reading producers of the given ranks.
    ///
    /// A consumer with no sources sits just above the signals. The result
    /// never reaches [`Rank::TERMINAL`].
    pub fn above<I>(sources: I) -> Rank
    where
        I: IntoIterator<Item = Rank>,
    {
        let highest = sources.into_iter().max().unwrap_or(Rank::SOURCE);
        Rank(highest.0.saturating_add(1).min(u32::MAX - 1))
    }

    /// Get the raw rank value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl Default for Rank {
    fn default() -> Self {
        Rank::SOURCE
    }
}

impl From<u32> for Rank {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
