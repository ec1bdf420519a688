//! Error types for the reactive engine.
//!
//! Reads and writes on reactive cells cannot fail. Errors only surface from
//! configuration loading and from a batch flush that never settles.

use thiserror::Error;

/// Errors reported by the reactive engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A batch flush ran more listener invocations than allowed.
    ///
    /// This almost always means the graph contains a cycle: a listener
    /// writes to a producer that eventually notifies the same listener.
    #[error("batch flush exceeded {limit} listener invocations; the dependency graph is probably cyclic")]
    FlushLimitExceeded { limit: usize },

    /// The engine configuration could not be parsed or is invalid.
    #[error("invalid reactive configuration: {reason}")]
    Config { reason: String },
}

impl ReactiveError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ReactiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
