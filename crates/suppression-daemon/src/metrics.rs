//! Prometheus counters, modeled on
//! `kumod::metrics_helper`'s `Lazy`-static registration pattern, scaled
//! down to the counters this subsystem needs: cycle counts, hub
//! hit/miss counts, sampler invocations, and acquire failures per
//! provider.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, IntCounter, IntCounterVec, Opts};

pub static CYCLES_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("suppression_cycles_started_total", "refresh cycles started, by trigger"),
        &["trigger"],
    )
    .expect("metric registration");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
});

pub static CYCLES_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("suppression_cycles_completed_total", "refresh cycles completed, by terminal status"),
        &["status"],
    )
    .expect("metric registration");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
});

pub static HUB_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("suppression_hub_checks_total", "hub membership checks, by outcome"),
        &["outcome"],
    )
    .expect("metric registration");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
});

pub static SAMPLER_INVOCATIONS: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "suppression_sampler_invocations_total",
        "cross-reference sampler estimate() calls",
    )
    .expect("metric registration");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
});

pub static ACQUIRE_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let counter = CounterVec::new(
        Opts::new("suppression_acquire_failures_total", "acquisition failures, by provider"),
        &["provider"],
    )
    .expect("metric registration");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
});

pub fn record_hub_check(suppressed: bool) {
    let outcome = if suppressed { "suppressed" } else { "deliverable" };
    HUB_CHECKS.with_label_values(&[outcome]).inc();
}
