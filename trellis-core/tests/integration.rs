//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computeds, effects and batches work
//! together correctly.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use trellis_core::reactive::{
    batch, try_batch, untracked, Computed, Effect, Listener, ReactiveContext, Runtime, Signal,
    SubscriberId,
};
use trellis_core::{ReactiveError, TrackingMode};

fn counter() -> (Arc<AtomicI32>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicI32::new(0));
    let count_clone = count.clone();
    (count, move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
    })
}

/// A written value is read back.
#[test]
fn read_after_write() {
    let signal = Signal::new(String::from("a"));
    for value in ["b", "c", ""] {
        signal.set(value.to_string());
        assert_eq!(signal.get(), value);
    }
}

/// Each distinct listener fires once per write, in subscription order.
#[test]
fn listener_fan_out_in_subscription_order() {
    let signal = Signal::new(0);
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let log = log.clone();
        signal.subscribe(move || log.lock().push(name));
    }

    signal.set(1);
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

/// Subscribing the same listener twice registers it once.
#[test]
fn duplicate_subscription_is_ignored() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    let listener = Listener::new(bump);

    let first = signal.subscribe(listener.clone());
    let second = signal.subscribe(listener.clone());
    assert_eq!(signal.subscriber_count(), 1);

    signal.set(1);
    assert_eq!(count.load(Ordering::SeqCst), 1);

    second.unsubscribe();
    assert!(!first.is_active());
}

/// Unsubscribing twice is the same as once.
#[test]
fn unsubscribe_is_idempotent() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    let (other_count, other_bump) = counter();

    let subscription = signal.subscribe(bump);
    signal.subscribe(other_bump);

    subscription.unsubscribe();
    subscription.unsubscribe();
    signal.set(1);

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(other_count.load(Ordering::SeqCst), 1);
}

/// The doubled scenario.
#[test]
fn computed_follows_its_signal() {
    let s = Signal::new(10);
    let doubled = {
        let s = s.clone();
        Computed::new(move || s.get() * 2)
    };

    assert_eq!(doubled.get(), 20);
    s.set(5);
    assert_eq!(doubled.get(), 10);
}

/// After any upstream write, a computed equals its derivation over the new
/// inputs, through a chain of computeds.
#[test]
fn computed_chain_is_never_stale() {
    let base = Signal::new(5);
    let doubled = {
        let base = base.clone();
        Computed::new(move || base.get() * 2)
    };
    let plus_ten = {
        let doubled = doubled.clone();
        Computed::new(move || doubled.get() + 10)
    };

    for value in [10, -3, 0, 7] {
        base.set(value);
        assert_eq!(doubled.get(), value * 2);
        assert_eq!(plus_ten.get(), value * 2 + 10);
    }
}

/// The effect log scenario.
#[test]
fn effect_logs_initial_run_and_reruns() {
    let s = Signal::new(10);
    let log = Arc::new(Mutex::new(Vec::new()));

    let _effect = {
        let (s, log) = (s.clone(), log.clone());
        Effect::new(move || log.lock().push(s.get()))
    };

    s.set(1);
    s.set(2);
    assert_eq!(*log.lock(), vec![10, 1, 2]);
}

/// Several writes in one batch notify each listener once, after the body.
#[test]
fn batch_notifies_once_after_body() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    signal.subscribe(bump);

    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let (signal, observed) = (signal.clone(), observed.clone());
        signal.clone().subscribe(move || observed.lock().push(signal.get()));
    }

    let returned = batch(|| {
        signal.set(1);
        signal.set(2);
        signal.set(3);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        "body result"
    });

    assert_eq!(returned, "body result");
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(*observed.lock(), vec![3]);
}

/// Writes inside untracked never notify.
#[test]
fn untracked_writes_are_silent() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    signal.subscribe(bump);

    let result = untracked(|| {
        signal.set(1);
        signal.set(2);
        signal.get()
    });

    assert_eq!(result, 2);
    assert_eq!(signal.get(), 2);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    // Discarded, not deferred: a later batch does not deliver them.
    batch(|| {});
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// Reads inside untracked do not become dependencies.
#[test]
fn untracked_reads_create_no_edges() {
    let tracked = Signal::new(1);
    let hidden = Signal::new(100);

    let sum = {
        let (tracked, hidden) = (tracked.clone(), hidden.clone());
        Computed::new(move || tracked.get() + untracked(|| hidden.get()))
    };
    assert_eq!(sum.dependency_count(), 1);
    assert_eq!(hidden.subscriber_count(), 0);

    hidden.set(200);
    assert_eq!(sum.get(), 101);

    tracked.set(2);
    assert_eq!(sum.get(), 202);
}

/// Untracked inside an effect body hides both the read and the write.
#[test]
fn untracked_inside_effect() {
    let trigger = Signal::new(0);
    let audit = Signal::new(0);
    let (audit_count, bump) = counter();
    audit.subscribe(bump);

    let effect = {
        let (trigger, audit) = (trigger.clone(), audit.clone());
        Effect::new(move || {
            let value = trigger.get();
            untracked(|| audit.set(audit.get() + value));
        })
    };

    trigger.set(5);
    assert_eq!(effect.dependency_count(), 1);
    assert_eq!(audit.get(), 5);
    assert_eq!(audit_count.load(Ordering::SeqCst), 0);
}

fn diamond() -> (Signal<i32>, Computed<i32>, Computed<i32>, Computed<i32>, Arc<Mutex<Vec<(i32, i32)>>>) {
    let a = Signal::new(1);
    let b = {
        let a = a.clone();
        Computed::new(move || a.get() * 2)
    };
    let c = {
        let a = a.clone();
        Computed::new(move || a.get() + 1)
    };

    let inputs = Arc::new(Mutex::new(Vec::new()));
    let d = {
        let (b, c, inputs) = (b.clone(), c.clone(), inputs.clone());
        Computed::new(move || {
            let (b, c) = (b.get(), c.get());
            inputs.lock().push((b, c));
            b + c
        })
    };

    (a, b, c, d, inputs)
}

/// The diamond recomputes its bottom once per batch, with settled inputs.
#[test]
fn diamond_recomputes_once_in_batch() {
    let (a, b, c, d, inputs) = diamond();
    assert_eq!(d.get(), 4);

    batch(|| a.set(2));

    assert_eq!(b.get(), 4);
    assert_eq!(c.get(), 3);
    assert_eq!(d.get(), 7);
    assert_eq!(d.recompute_count(), 1);
    assert_eq!(*inputs.lock(), vec![(2, 2), (4, 3)]);
}

/// Outside a batch the diamond converges, but the bottom may run once per
/// changed branch.
#[test]
fn diamond_converges_without_batch() {
    let (a, _b, _c, d, inputs) = diamond();

    a.set(2);

    assert_eq!(d.get(), 7);
    assert_eq!(d.recompute_count(), 2);
    assert_eq!(inputs.lock().last(), Some(&(4, 3)));
}

/// Only some of a consumer's producers change inside a batch: it still
/// recomputes exactly once.
#[test]
fn partial_change_in_batch_still_recomputes() {
    let a = Signal::new(1);
    let b = Signal::new(1);
    let c = Signal::new(1);

    let product = {
        let (a, b, c) = (a.clone(), b.clone(), c.clone());
        Computed::new(move || a.get() * b.get() * c.get())
    };
    let effect = {
        let (a, b, c) = (a.clone(), b.clone(), c.clone());
        Effect::new(move || a.get() + b.get() + c.get())
    };

    batch(|| {
        a.set(2);
        b.set(3);
    });

    assert_eq!(product.get(), 6);
    assert_eq!(product.recompute_count(), 1);
    assert_eq!(effect.run_count(), 2);
}

/// A listener on a computed sees the batch's final value exactly once.
#[test]
fn computed_listener_fires_once_per_batch() {
    let (a, _b, _c, d, _inputs) = diamond();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let (reader, seen) = (d.clone(), seen.clone());
        d.subscribe(move || seen.lock().push(reader.get()));
    }

    batch(|| {
        a.set(2);
        a.set(3);
    });

    assert_eq!(*seen.lock(), vec![10]);
}

/// An effect over a diamond runs once, with consistent values.
#[test]
fn effect_over_diamond_is_glitch_free() {
    let (a, b, c, _d, _inputs) = diamond();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _effect = {
        let (a, b, c, seen) = (a.clone(), b.clone(), c.clone(), seen.clone());
        Effect::new(move || seen.lock().push((a.get(), b.get(), c.get())))
    };

    batch(|| a.set(5));
    assert_eq!(*seen.lock(), vec![(1, 2, 2), (5, 10, 6)]);
}

/// Nested batches are one batch.
#[test]
fn nested_batch_is_a_reentry() {
    let signal = Signal::new(0);
    let (count, bump) = counter();
    signal.subscribe(bump);

    batch(|| {
        batch(|| signal.set(1));
        assert!(Runtime::is_batching());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        batch(|| signal.set(2));
    });

    assert!(!Runtime::is_batching());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// A listener writing during the flush has its notifications delivered in
/// the same flush.
#[test]
fn writes_during_flush_join_the_flush() {
    let source = Signal::new(0);
    let mirror = Signal::new(0);
    let (mirror_count, bump) = counter();
    mirror.subscribe(bump);

    {
        let (source, mirror) = (source.clone(), mirror.clone());
        source.clone().subscribe(move || mirror.set(source.get() + 1));
    }

    batch(|| source.set(10));

    assert_eq!(mirror.get(), 11);
    assert_eq!(mirror_count.load(Ordering::SeqCst), 1);
}

/// A cyclic graph inside a batch is reported instead of spinning forever.
#[test]
fn cyclic_batch_reports_flush_limit() {
    let ping = Signal::new(0u64);
    let pong = Signal::new(0u64);

    {
        let (ping, pong) = (ping.clone(), pong.clone());
        ping.clone().subscribe(move || pong.set(ping.get_untracked() + 1));
    }
    {
        let (ping, pong) = (ping.clone(), pong.clone());
        pong.clone().subscribe(move || ping.set(pong.get_untracked() + 1));
    }

    let result = try_batch(|| ping.set(1));
    assert!(matches!(result, Err(ReactiveError::FlushLimitExceeded { .. })));
    assert!(!Runtime::is_batching());
}

/// Static tracking keeps the first evaluation's dependencies.
#[test]
fn static_tracking_misses_late_branches() {
    let use_fallback = Signal::new(false);
    let primary = Signal::new(1);
    let fallback = Signal::new(100);

    let chosen = {
        let (use_fallback, primary, fallback) =
            (use_fallback.clone(), primary.clone(), fallback.clone());
        Computed::with_tracking(TrackingMode::Static, move || {
            if use_fallback.get() {
                fallback.get()
            } else {
                primary.get()
            }
        })
    };

    use_fallback.set(true);
    assert_eq!(chosen.get(), 100);

    // `fallback` was never read during the first evaluation.
    fallback.set(200);
    assert_eq!(chosen.get(), 100);
    assert_eq!(chosen.dependency_count(), 2);
}

/// Dynamic tracking follows the branch actually taken.
#[test]
fn dynamic_tracking_follows_branches() {
    let use_fallback = Signal::new(false);
    let primary = Signal::new(1);
    let fallback = Signal::new(100);

    let chosen = {
        let (use_fallback, primary, fallback) =
            (use_fallback.clone(), primary.clone(), fallback.clone());
        Computed::with_tracking(TrackingMode::Dynamic, move || {
            if use_fallback.get() {
                fallback.get()
            } else {
                primary.get()
            }
        })
    };

    use_fallback.set(true);
    fallback.set(200);
    assert_eq!(chosen.get(), 200);
    assert_eq!(primary.subscriber_count(), 0);

    let recomputes = chosen.recompute_count();
    primary.set(2);
    assert_eq!(chosen.recompute_count(), recomputes);
}

/// Dynamic effects re-rank when they start reading deeper producers.
#[test]
fn dynamic_effect_reranks_after_new_dependency() {
    let gate = Signal::new(false);
    let a = Signal::new(1);
    let doubled = {
        let a = a.clone();
        Computed::new(move || a.get() * 2)
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let _effect = {
        let (gate, a, doubled, seen) = (gate.clone(), a.clone(), doubled.clone(), seen.clone());
        Effect::with_tracking(TrackingMode::Dynamic, move || {
            if gate.get() {
                seen.lock().push((a.get(), doubled.get()));
            }
        })
    };

    gate.set(true);
    batch(|| a.set(3));

    assert_eq!(*seen.lock(), vec![(1, 2), (3, 6)]);
}

/// A chain `source -> c1 -> c2 -> c3`, a dynamic `mid` that starts out
/// reading only `gate`, and a static `bottom` that reads `mid` and `source`.
struct Deepening {
    gate: Signal<bool>,
    source: Signal<i32>,
    bottom: Computed<(i32, i32)>,
    seen: Arc<Mutex<Vec<(i32, i32)>>>,
}

fn deepening_graph() -> Deepening {
    let gate = Signal::new(false);
    let source = Signal::new(1);
    let c1 = {
        let source = source.clone();
        Computed::new(move || source.get())
    };
    let c2 = {
        let c1 = c1.clone();
        Computed::new(move || c1.get())
    };
    let c3 = {
        let c2 = c2.clone();
        Computed::new(move || c2.get())
    };
    let mid = {
        let (gate, c3) = (gate.clone(), c3.clone());
        Computed::with_tracking(TrackingMode::Dynamic, move || if gate.get() { c3.get() } else { 1 })
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let bottom = {
        let (mid, source, seen) = (mid.clone(), source.clone(), seen.clone());
        Computed::with_tracking(TrackingMode::Static, move || {
            let inputs = (mid.get(), source.get());
            seen.lock().push(inputs);
            inputs
        })
    };

    Deepening { gate, source, bottom, seen }
}

/// Once a dynamic computed starts reading a deeper chain, its consumers
/// wait for that chain inside a batch.
#[test]
fn consumers_of_deepened_computed_stay_glitch_free() {
    let graph = deepening_graph();
    graph.gate.set(true);
    graph.seen.lock().clear();
    let recomputes = graph.bottom.recompute_count();

    batch(|| graph.source.set(5));

    assert_eq!(*graph.seen.lock(), vec![(5, 5)]);
    assert_eq!(graph.bottom.recompute_count(), recomputes + 1);
    assert_eq!(graph.bottom.get(), (5, 5));
}

/// The same holds when the dependency appears during the flush itself.
#[test]
fn dependency_found_mid_flush_delays_consumers() {
    let graph = deepening_graph();
    graph.seen.lock().clear();

    batch(|| {
        graph.gate.set(true);
        graph.source.set(5);
    });

    assert_eq!(*graph.seen.lock(), vec![(5, 5)]);
    assert_eq!(graph.bottom.get(), (5, 5));
}

/// Reads inside a listener fired from an effect body do not leak into the
/// effect's dependencies.
#[test]
fn listener_reads_do_not_leak_into_consumers() {
    let trigger = Signal::new(0);
    let side = Signal::new(0);
    let bystander = Signal::new(0);

    {
        let bystander = bystander.clone();
        side.subscribe(move || {
            bystander.get();
        });
    }

    let effect = {
        let (trigger, side) = (trigger.clone(), side.clone());
        Effect::new(move || {
            if trigger.get() == 0 {
                side.set(1);
            }
        })
    };

    assert_eq!(effect.dependency_count(), 1);
    assert_eq!(bystander.subscriber_count(), 0);
}

/// A computed can be created while an effect is evaluating without
/// disturbing the effect's own tracking.
#[test]
fn nested_construction_tracks_separately() {
    let outer = Signal::new(1);
    let inner = Signal::new(10);
    let created = Arc::new(Mutex::new(Vec::new()));

    let effect = {
        let (outer, inner, created) = (outer.clone(), inner.clone(), created.clone());
        Effect::new(move || {
            let base = outer.get();
            let inner = inner.clone();
            let derived = Computed::new(move || inner.get() + base);
            created.lock().push(derived);
        })
    };

    assert_eq!(effect.dependency_count(), 1);
    assert_eq!(inner.subscriber_count(), 1);

    inner.set(20);
    assert_eq!(created.lock()[0].get(), 21);
}

/// Disposing an effect stops its reruns.
#[test]
fn disposed_effect_does_not_run() {
    let signal = Signal::new(0);
    let (run_count, bump) = counter();

    let effect = {
        let signal = signal.clone();
        Effect::new(move || {
            signal.get();
            bump();
        })
    };
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    effect.dispose();
    signal.set(1);
    batch(|| signal.set(2));

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    assert_eq!(signal.subscriber_count(), 0);
}

/// A panicking derivation propagates and leaves the engine usable.
#[test]
fn panicking_derivation_leaves_context_clean() {
    let signal = Signal::new(0);

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        let signal = signal.clone();
        Computed::new(move || -> i32 {
            signal.get();
            panic!("derivation failed")
        })
    }));

    assert!(result.is_err());
    assert!(!ReactiveContext::is_active());
    assert_eq!(signal.subscriber_count(), 0);

    let doubled = {
        let signal = signal.clone();
        Computed::new(move || signal.get() * 2)
    };
    signal.set(4);
    assert_eq!(doubled.get(), 8);
}

/// Handles can be moved to another thread; each thread has its own batch.
#[test]
fn cells_cross_threads() {
    let signal = Signal::new(1);
    let doubled = {
        let signal = signal.clone();
        Computed::new(move || signal.get() * 2)
    };

    let handle = {
        let signal = signal.clone();
        std::thread::spawn(move || {
            batch(|| signal.set(21));
            assert!(!ReactiveContext::is_active());
        })
    };
    handle.join().unwrap();

    assert_eq!(doubled.get(), 42);
}

/// Tracking frames nest by subscriber.
#[test]
fn nested_reactive_contexts() {
    let outer_id = SubscriberId::new();
    let inner_id = SubscriberId::new();
    let (a, b) = (Signal::new(1), Signal::new(2));

    let _outer_ctx = ReactiveContext::enter(outer_id);
    a.get();

    {
        let _inner_ctx = ReactiveContext::enter(inner_id);
        b.get();
        assert_eq!(ReactiveContext::dependencies(), vec![b.id()]);
    }

    assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
    assert_eq!(ReactiveContext::dependencies(), vec![a.id()]);
}
