//! Cost collection pass
//!
//! One pass walks every cluster sequentially, fetches the aggregated cost for
//! the current billing window and turns it into gauge samples:
//!
//! - the cluster total, as reported by the billing source
//! - per workload, after cardinality reduction: the total plus one sample per
//!   resource (storage, compute, network)
//! - per namespace, the sum of its workloads' totals
//!
//! Labels come only from the [`LabelCache`]. A workload whose labels are not
//! cached yet is left out of the workload gauges but still counts toward its
//! namespace total.

use crate::billing::{AggregatedCostRequest, BillingClient, DEFAULT_GROUP_BY};
use crate::cache::{LabelCache, LabelKey};
use crate::cardinality::reduce_records;
use crate::emitter::{CostMetrics, MetricBatch};
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::models::{Cluster, ClusterCostReport, CostRecord, Labels};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::window::BillingWindow;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::warn;

/// Outcome of one collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub clusters_ok: usize,
    pub clusters_failed: usize,
    pub workloads_emitted: usize,
    pub cache_misses: usize,
}

impl CollectionSummary {
    fn merge(&mut self, other: CollectionSummary) {
        self.clusters_ok += other.clusters_ok;
        self.clusters_failed += other.clusters_failed;
        self.workloads_emitted += other.workloads_emitted;
        self.cache_misses += other.cache_misses;
    }
}

pub struct CostAggregator {
    billing: Arc<dyn BillingClient>,
    cache: Arc<LabelCache>,
    clusters: Vec<Cluster>,
    metrics: CostMetrics,
    group_by: String,
    health: HealthRegistry,
    self_metrics: ExporterMetrics,
    logger: StructuredLogger,
}

impl CostAggregator {
    pub fn new(
        billing: Arc<dyn BillingClient>,
        cache: Arc<LabelCache>,
        clusters: Vec<Cluster>,
        metrics: CostMetrics,
    ) -> Self {
        Self {
            billing,
            cache,
            clusters,
            metrics,
            group_by: DEFAULT_GROUP_BY.to_string(),
            health: HealthRegistry::new(),
            self_metrics: ExporterMetrics::new(),
            logger: StructuredLogger::new("cost-exporter"),
        }
    }

    pub fn with_group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = group_by.into();
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn metrics(&self) -> &CostMetrics {
        &self.metrics
    }

    /// Run one collection pass over the current billing window
    pub async fn collect(&self) -> (MetricBatch, CollectionSummary) {
        self.collect_window(BillingWindow::current()).await
    }

    /// Run one collection pass over `window`
    pub async fn collect_window(&self, window: BillingWindow) -> (MetricBatch, CollectionSummary) {
        let start = Instant::now();
        let mut batch = MetricBatch::new();
        let mut summary = CollectionSummary::default();

        for cluster in &self.clusters {
            let outcome = self.collect_cluster(cluster, window, &mut batch).await;
            summary.merge(outcome);
        }

        let elapsed = start.elapsed();
        self.self_metrics.observe_collection_duration(elapsed.as_secs_f64());
        self.self_metrics.set_clusters_collected(summary.clusters_ok);
        self.health
            .update(
                components::BILLING,
                ComponentHealth::from_cluster_outcome(summary.clusters_ok, summary.clusters_failed),
            )
            .await;
        self.logger.log_collection(
            summary.clusters_ok,
            summary.clusters_failed,
            summary.workloads_emitted,
            summary.cache_misses,
            elapsed.as_millis(),
        );

        (batch, summary)
    }

    /// Collect one cluster; a billing failure skips the cluster
    pub async fn collect_cluster(
        &self,
        cluster: &Cluster,
        window: BillingWindow,
        batch: &mut MetricBatch,
    ) -> CollectionSummary {
        let request = AggregatedCostRequest::new(&cluster.id, window, &self.group_by);

        match self.billing.cluster_aggregated_cost(&request).await {
            Ok(report) => {
                let mut summary = self.emit_report(cluster, &report, batch);
                summary.clusters_ok = 1;
                summary
            }
            Err(e) => {
                warn!(
                    cluster_id = %cluster.id,
                    window = %window,
                    error = %e,
                    "Failed to fetch aggregated cluster cost"
                );
                self.self_metrics.inc_cluster_errors();
                CollectionSummary {
                    clusters_failed: 1,
                    ..Default::default()
                }
            }
        }
    }

    /// Turn one cluster's cost report into samples
    pub fn emit_report(
        &self,
        cluster: &Cluster,
        report: &ClusterCostReport,
        batch: &mut MetricBatch,
    ) -> CollectionSummary {
        let mut summary = CollectionSummary::default();

        batch.push(
            &self.metrics.cluster_cost,
            report.total_cost,
            vec![cluster.id.clone(), cluster.name.clone()],
        );

        let workloads: Vec<CostRecord> = report
            .records
            .iter()
            .filter(|r| r.kind.is_workload())
            .cloned()
            .collect();

        let mut namespace_totals: BTreeMap<String, f64> = BTreeMap::new();

        for record in reduce_records(workloads) {
            *namespace_totals.entry(record.namespace.clone()).or_insert(0.0) += record.total;

            match self
                .cache
                .get_labels_for(&record.kind, &record.namespace, &cluster.id, &record.name)
            {
                Ok(labels) => {
                    self.emit_workload(cluster, &record, &labels, batch);
                    summary.workloads_emitted += 1;
                }
                Err(_) => {
                    summary.cache_misses += 1;
                    self.self_metrics.inc_cache_misses();
                    warn!(
                        cluster_id = %cluster.id,
                        kind = %record.kind,
                        namespace = %record.namespace,
                        identifier = %record.name,
                        "Skipping workload without cached labels"
                    );
                }
            }
        }

        for (namespace, total) in namespace_totals {
            match self.cache.get(&LabelKey::namespace(&cluster.id, &namespace)) {
                Ok(labels) => {
                    let mut values = vec![cluster.id.clone(), cluster.name.clone(), namespace];
                    values.extend(self.metrics.mappings().label_values(&labels));
                    batch.push(&self.metrics.namespace_cost, total, values);
                }
                Err(miss) => {
                    summary.cache_misses += 1;
                    self.self_metrics.inc_cache_misses();
                    warn!(
                        cluster_id = %cluster.id,
                        namespace = %miss.key.namespace,
                        "Skipping namespace without cached labels"
                    );
                }
            }
        }

        summary
    }

    fn emit_workload(&self, cluster: &Cluster, record: &CostRecord, labels: &Labels, batch: &mut MetricBatch) {
        let mapped = self.metrics.mappings().label_values(labels);
        let base = [
            cluster.id.clone(),
            cluster.name.clone(),
            record.namespace.clone(),
            record.name.clone(),
            record.kind.workload_label(),
        ];

        let mut values = base.to_vec();
        values.extend(mapped.iter().cloned());
        batch.push(&self.metrics.workload_cost, record.total, values);

        for (resource, cost) in [
            ("storage", record.storage),
            ("compute", record.compute),
            ("network", record.network()),
        ] {
            let mut values = base.to_vec();
            values.push(resource.to_string());
            values.extend(mapped.iter().cloned());
            batch.push(&self.metrics.resource_cost, cost, values);
        }
    }
}
