//! Self-observability for the cost exporter
//!
//! Provides:
//! - Prometheus metrics about the exporter itself (pass durations, errors, cache state)
//! - Structured JSON logging of lifecycle events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Buckets for pass durations in seconds; a pass spans several billing calls
const PASS_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    collection_duration_seconds: Histogram,
    population_duration_seconds: Histogram,
    cluster_collection_errors: IntCounter,
    label_cache_misses: IntCounter,
    label_lookup_errors: IntCounter,
    label_cache_entries: IntGauge,
    clusters_collected: IntGauge,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            collection_duration_seconds: register_histogram!(
                "cost_exporter_collection_duration_seconds",
                "Time spent in one cost collection pass",
                PASS_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_duration_seconds"),

            population_duration_seconds: register_histogram!(
                "cost_exporter_label_population_duration_seconds",
                "Time spent in one label cache population pass",
                PASS_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register label_population_duration_seconds"),

            cluster_collection_errors: register_int_counter!(
                "cost_exporter_cluster_collection_errors_total",
                "Number of cluster cost requests that failed"
            )
            .expect("Failed to register cluster_collection_errors_total"),

            label_cache_misses: register_int_counter!(
                "cost_exporter_label_cache_misses_total",
                "Number of label lookups that found no live cache entry"
            )
            .expect("Failed to register label_cache_misses_total"),

            label_lookup_errors: register_int_counter!(
                "cost_exporter_label_lookup_errors_total",
                "Number of metadata lookups that failed during population"
            )
            .expect("Failed to register label_lookup_errors_total"),

            label_cache_entries: register_int_gauge!(
                "cost_exporter_label_cache_entries",
                "Number of entries in the label cache after the last population"
            )
            .expect("Failed to register label_cache_entries"),

            clusters_collected: register_int_gauge!(
                "cost_exporter_clusters_collected",
                "Number of clusters collected successfully in the last pass"
            )
            .expect("Failed to register clusters_collected"),
        }
    }
}

/// Handle to the process-wide exporter metrics
///
/// Clones share the same underlying metrics in the default registry.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a handle, registering the metrics on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    pub fn observe_collection_duration(&self, duration_secs: f64) {
        self.inner().collection_duration_seconds.observe(duration_secs);
    }

    pub fn observe_population_duration(&self, duration_secs: f64) {
        self.inner().population_duration_seconds.observe(duration_secs);
    }

    pub fn inc_cluster_errors(&self) {
        self.inner().cluster_collection_errors.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().label_cache_misses.inc();
    }

    pub fn inc_lookup_errors(&self) {
        self.inner().label_lookup_errors.inc();
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.inner().label_cache_entries.set(entries as i64);
    }

    pub fn set_clusters_collected(&self, clusters: usize) {
        self.inner().clusters_collected.set(clusters as i64);
    }
}

/// Structured logger for exporter lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, clusters: usize, metadata_source: &str) {
        info!(
            event = "exporter_started",
            instance = %self.instance,
            exporter_version = %version,
            clusters = clusters,
            metadata_source = %metadata_source,
            "Cost exporter started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Cost exporter shutting down"
        );
    }

    pub fn log_population(
        &self,
        clusters_ok: usize,
        clusters_failed: usize,
        entries_stored: usize,
        lookups_failed: usize,
        duration_ms: u128,
    ) {
        if clusters_failed > 0 || lookups_failed > 0 {
            warn!(
                event = "label_population_complete",
                instance = %self.instance,
                clusters_ok = clusters_ok,
                clusters_failed = clusters_failed,
                entries_stored = entries_stored,
                lookups_failed = lookups_failed,
                duration_ms = duration_ms as u64,
                "Label population finished with failures"
            );
        } else {
            info!(
                event = "label_population_complete",
                instance = %self.instance,
                clusters_ok = clusters_ok,
                entries_stored = entries_stored,
                duration_ms = duration_ms as u64,
                "Label population finished"
            );
        }
    }

    pub fn log_collection(
        &self,
        clusters_ok: usize,
        clusters_failed: usize,
        workloads_emitted: usize,
        cache_misses: usize,
        duration_ms: u128,
    ) {
        info!(
            event = "collection_complete",
            instance = %self.instance,
            clusters_ok = clusters_ok,
            clusters_failed = clusters_failed,
            workloads_emitted = workloads_emitted,
            cache_misses = cache_misses,
            duration_ms = duration_ms as u64,
            "Cost collection pass finished"
        );
    }
}
