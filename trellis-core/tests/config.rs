//! Configuration Tests
//!
//! These run in their own test binary because they change the
//! process-wide configuration.

use trellis_core::config::{self, ReactiveConfig, TrackingMode};
use trellis_core::reactive::{try_batch, Computed, Effect, Signal};
use trellis_core::ReactiveError;

#[test]
fn installed_config_drives_new_cells_and_flushes() {
    let invalid = ReactiveConfig {
        max_flush_steps: 0,
        ..ReactiveConfig::default()
    };
    assert!(config::install(invalid).is_err());
    assert_eq!(config::current(), ReactiveConfig::default());

    let static_cell = Computed::new(|| 1);

    let tuned = ReactiveConfig::from_json(r#"{ "tracking": "dynamic", "max_flush_steps": 8 }"#)
        .expect("valid config");
    config::install(tuned.clone()).expect("install");
    assert_eq!(config::current(), tuned);

    let dynamic_cell = Computed::new(|| 2);
    let effect = Effect::new(|| {});
    assert_eq!(static_cell.tracking(), TrackingMode::Static);
    assert_eq!(dynamic_cell.tracking(), TrackingMode::Dynamic);
    assert_eq!(effect.tracking(), TrackingMode::Dynamic);

    // Ten listeners need ten flush steps; the limit is eight.
    let signal = Signal::new(0);
    for _ in 0..10 {
        signal.subscribe(|| {});
    }
    let result = try_batch(|| signal.set(1));
    assert_eq!(result, Err(ReactiveError::FlushLimitExceeded { limit: 8 }));
}
