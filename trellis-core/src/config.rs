//! Engine Configuration
//!
//! A small process-wide configuration consulted when computeds and effects
//! are created and when a batch flushes. It can be built in code, parsed
//! from JSON, or read from environment variables.
//!
//! ```rust,ignore
//! use trellis_core::config::{self, ReactiveConfig, TrackingMode};
//!
//! config::install(ReactiveConfig {
//!     tracking: TrackingMode::Dynamic,
//!     ..ReactiveConfig::default()
//! })?;
//! ```

use std::str::FromStr;
use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{ReactiveError, Result};

/// Environment variable selecting the default tracking mode.
pub const ENV_TRACKING: &str = "TRELLIS_TRACKING";

/// Environment variable overriding the flush step limit.
pub const ENV_MAX_FLUSH_STEPS: &str = "TRELLIS_MAX_FLUSH_STEPS";

/// How a consumer discovers its sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Sources are captured during the first evaluation only.
    ///
    /// A producer read for the first time by a later evaluation (for
    /// example behind a branch that was not taken initially) never becomes
    /// a dependency.
    #[default]
    Static,

    /// Sources are re-discovered on every evaluation.
    ///
    /// New sources are subscribed and sources no longer read are dropped.
    Dynamic,
}

impl FromStr for TrackingMode {
    type Err = ReactiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(ReactiveError::config(format!(
                "unknown tracking mode `{other}` (expected `static` or `dynamic`)"
            ))),
        }
    }
}

/// Process-wide engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReactiveConfig {
    /// Tracking mode used by `Computed::new` and `Effect::new`.
    pub tracking: TrackingMode,

    /// Maximum number of listener invocations a single batch flush may
    /// perform before it is abandoned.
    pub max_flush_steps: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            tracking: TrackingMode::Static,
            max_flush_steps: 100_000,
        }
    }
}

impl ReactiveConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from the `TRELLIS_*` environment variables,
    /// falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(mode) = lookup(ENV_TRACKING) {
            config.tracking = mode.parse()?;
        }

        if let Some(steps) = lookup(ENV_MAX_FLUSH_STEPS) {
            config.max_flush_steps = steps.trim().parse().map_err(|_| {
                ReactiveError::config(format!(
                    "{ENV_MAX_FLUSH_STEPS} must be a positive integer, got `{steps}`"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_flush_steps == 0 {
            return Err(ReactiveError::config("max_flush_steps must be greater than zero"));
        }
        Ok(())
    }
}

static CONFIG: OnceLock<RwLock<ReactiveConfig>> = OnceLock::new();

fn slot() -> &'static RwLock<ReactiveConfig> {
    CONFIG.get_or_init(|| RwLock::new(ReactiveConfig::default()))
}

/// Replace the process-wide configuration.
///
/// Cells that already exist keep the tracking mode they were created with.
pub fn install(config: ReactiveConfig) -> Result<()> {
    config.validate()?;
    tracing::debug!(?config, "installing reactive configuration");
    *slot().write() = config;
    Ok(())
}

/// The configuration currently in effect.
pub fn current() -> ReactiveConfig {
    slot().read().clone()
}
