//! Process-wide fetch counters.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

// Fetches handed to the dispatcher
static FETCH_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pingfetch_fetch_started_total",
        "The total number of fetches scheduled since pingfetch started"
    )
    .unwrap()
});

// Completions by result
static FETCH_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pingfetch_fetch_completed_total",
        "Fetch completions per result in pingfetch",
        &["result"]
    )
    .unwrap()
});

static DNS_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pingfetch_dns_failures_total",
        "Fetches abandoned because the target host did not resolve"
    )
    .unwrap()
});

static FETCH_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pingfetch_fetch_active",
        "Fetches scheduled but not yet completed"
    )
    .unwrap()
});

pub fn record_started() {
    FETCH_STARTED.inc();
    FETCH_ACTIVE.inc();
}

pub fn record_completed(success: bool) {
    let result = if success { "success" } else { "failure" };
    FETCH_COMPLETED.with_label_values(&[result]).inc();
    FETCH_ACTIVE.dec();
}

pub fn record_dns_failure() {
    DNS_FAILURES.inc();
}

pub fn started_total() -> u64 {
    FETCH_STARTED.get()
}

pub fn completed_total(success: bool) -> u64 {
    let result = if success { "success" } else { "failure" };
    FETCH_COMPLETED.with_label_values(&[result]).get()
}

pub fn dns_failures_total() -> u64 {
    DNS_FAILURES.get()
}
