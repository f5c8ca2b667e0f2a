//! Prometheus metrics for the ledger core.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Entry posting counter.
pub static ENTRIES_POSTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_entries_posted_total",
        "Total number of transaction entries posted",
        &["status"] // ok, error
    )
    .expect("Failed to register entries_posted_total")
});

/// Account counter by type.
pub static ACCOUNTS_CREATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_accounts_created_total",
        "Total number of accounts created",
        &["account_type"]
    )
    .expect("Failed to register accounts_created")
});

/// Reconciliation run counter.
pub static RECONCILIATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ledger_reconciliations_total",
        "Total number of reconciliation runs",
        &["outcome"] // reconciled, corrected, failed
    )
    .expect("Failed to register reconciliations_total")
});

/// Storage operation duration histogram.
pub static STORE_OP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ledger_store_op_duration_seconds",
        "Storage operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register store_op_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&ENTRIES_POSTED_TOTAL);
    Lazy::force(&ACCOUNTS_CREATED);
    Lazy::force(&RECONCILIATIONS_TOTAL);
    Lazy::force(&STORE_OP_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
