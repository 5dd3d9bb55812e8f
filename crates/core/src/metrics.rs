//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Document fetches (outcomes, bytes, per-case fetch duration)
//! - Case files (final state of each processed case file)
//! - Delivery and whole runs

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Fetch Metrics
// =============================================================================

/// Document fetch outcomes.
pub static DOCUMENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_documents_total", "Documents handled by the fetcher"),
        &["outcome"], // "fetched", "skipped", "failed"
    )
    .unwrap()
});

/// Bytes written for fetched documents.
pub static DOCUMENT_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dossier_document_bytes_total",
        "Bytes of document content written to workspaces",
    )
    .unwrap()
});

/// Duration of the fetch stage of one case file.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dossier_fetch_duration_seconds",
            "Duration of the concurrent fetch stage per case file",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0]),
        &["result"], // "complete", "incomplete", "aborted"
    )
    .unwrap()
});

// =============================================================================
// Case File / Run Metrics
// =============================================================================

/// Case files by final processing state.
pub static CASE_FILES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_case_files_total", "Case files by final state"),
        &["state"],
    )
    .unwrap()
});

/// Archive deliveries by result.
pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_deliveries_total", "Archive deliveries"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Runs by outcome.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dossier_runs_total", "Batch runs by outcome"),
        &["outcome"], // "finished", "aborted", "refused"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DOCUMENTS_TOTAL.clone()),
        Box::new(DOCUMENT_BYTES.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(CASE_FILES_TOTAL.clone()),
        Box::new(DELIVERIES_TOTAL.clone()),
        Box::new(RUNS_TOTAL.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        DOCUMENTS_TOTAL.with_label_values(&["fetched"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "dossier_documents_total"));
    }
}
