//! Prometheus metrics for search engines

use crate::search::config::EngineBackend;
use crate::search::error::SearchEngineResult;
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};
use std::time::Instant;

/// Search metrics
pub struct SearchMetrics {
    /// Operations by outcome
    pub operations: CounterVec,

    /// Operation latency
    pub operation_latency: HistogramVec,

    /// Supplementary facet queries issued
    pub supplementary_queries: CounterVec,

    /// Documents written
    pub documents_indexed: CounterVec,

    /// Documents removed
    pub documents_removed: CounterVec,
}

lazy_static! {
    pub static ref SEARCH_METRICS: SearchMetrics = SearchMetrics {
        operations: register_counter_vec!(
            "search_operations_total",
            "Total number of search engine operations",
            &["backend", "operation", "outcome"]
        )
        .unwrap(),

        operation_latency: register_histogram_vec!(
            "search_operation_latency_seconds",
            "Search engine operation latency in seconds",
            &["backend", "operation"]
        )
        .unwrap(),

        supplementary_queries: register_counter_vec!(
            "search_supplementary_queries_total",
            "Total number of supplementary facet queries",
            &["backend"]
        )
        .unwrap(),

        documents_indexed: register_counter_vec!(
            "search_documents_indexed_total",
            "Total number of documents indexed",
            &["backend"]
        )
        .unwrap(),

        documents_removed: register_counter_vec!(
            "search_documents_removed_total",
            "Total number of documents removed",
            &["backend"]
        )
        .unwrap(),
    };
}

/// Record the outcome and latency of one operation
pub fn observe<T>(
    backend: EngineBackend,
    operation: &str,
    started: Instant,
    result: &SearchEngineResult<T>,
) {
    let outcome = if result.is_ok() { "success" } else { "failure" };
    SEARCH_METRICS
        .operations
        .with_label_values(&[backend.as_str(), operation, outcome])
        .inc();
    SEARCH_METRICS
        .operation_latency
        .with_label_values(&[backend.as_str(), operation])
        .observe(started.elapsed().as_secs_f64());
}
