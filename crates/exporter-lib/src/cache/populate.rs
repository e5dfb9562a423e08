//! Background label population
//!
//! Runs on a fixed interval in a single task, so passes never overlap. Each
//! pass walks the current billing window of every cluster and refreshes the
//! labels of every namespace and workload found there.

use super::{LabelCache, LabelKey};
use crate::billing::{AggregatedCostRequest, BillingClient, DEFAULT_GROUP_BY};
use crate::cardinality::normalize_identifier;
use crate::error::ConfigError;
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::metadata::MetadataClient;
use crate::models::{Cluster, ClusterCostReport, ResourceKind};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::window::BillingWindow;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Outcome of one population pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationReport {
    pub clusters_ok: usize,
    pub clusters_failed: usize,
    pub entries_stored: usize,
    pub lookups_failed: usize,
    pub entries_purged: usize,
}

/// Fills a [`LabelCache`] from the billing and metadata sources
pub struct LabelPopulator {
    cache: Arc<LabelCache>,
    billing: Arc<dyn BillingClient>,
    metadata: Arc<dyn MetadataClient>,
    clusters: Vec<Cluster>,
    group_by: String,
    health: HealthRegistry,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
}

impl LabelPopulator {
    pub fn new(
        cache: Arc<LabelCache>,
        billing: Arc<dyn BillingClient>,
        metadata: Arc<dyn MetadataClient>,
        clusters: Vec<Cluster>,
    ) -> Self {
        Self {
            cache,
            billing,
            metadata,
            clusters,
            group_by: DEFAULT_GROUP_BY.to_string(),
            health: HealthRegistry::new(),
            metrics: ExporterMetrics::new(),
            logger: StructuredLogger::new("cost-exporter"),
        }
    }

    pub fn with_group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = group_by.into();
        self
    }

    /// Share the health registry that readiness is reported to
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Run one population pass over every cluster
    ///
    /// Failures are counted in the report and never abort the pass.
    pub async fn populate_once(&self) -> PopulationReport {
        let start = Instant::now();
        let window = BillingWindow::current();
        let mut report = PopulationReport::default();

        for cluster in &self.clusters {
            let request = AggregatedCostRequest::new(&cluster.id, window, &self.group_by);
            match self.billing.cluster_aggregated_cost(&request).await {
                Ok(costs) => {
                    report.clusters_ok += 1;
                    self.populate_cluster(&cluster.id, &costs, &mut report).await;
                }
                Err(e) => {
                    report.clusters_failed += 1;
                    warn!(
                        cluster_id = %cluster.id,
                        window = %window,
                        error = %e,
                        "Failed to fetch cost data for label population"
                    );
                }
            }
        }

        report.entries_purged = self.cache.purge_expired();

        let elapsed = start.elapsed();
        self.metrics.observe_population_duration(elapsed.as_secs_f64());
        self.metrics.set_cache_entries(self.cache.len());
        self.health
            .update(
                components::LABEL_CACHE,
                ComponentHealth::from_cluster_outcome(report.clusters_ok, report.clusters_failed),
            )
            .await;
        self.logger.log_population(
            report.clusters_ok,
            report.clusters_failed,
            report.entries_stored,
            report.lookups_failed,
            elapsed.as_millis(),
        );

        report
    }

    async fn populate_cluster(
        &self,
        cluster_id: &str,
        costs: &ClusterCostReport,
        report: &mut PopulationReport,
    ) {
        let mut stored: HashSet<LabelKey> = HashSet::new();
        let mut namespaces: BTreeSet<&str> = BTreeSet::new();

        for record in costs.records.iter().filter(|r| r.kind.is_workload()) {
            namespaces.insert(&record.namespace);

            // Aggregator lookups happen after reduction, so key by the reduced name
            let key = LabelKey::new(
                cluster_id,
                record.kind.clone(),
                &record.namespace,
                normalize_identifier(&record.name),
            );
            if stored.contains(&key) {
                continue;
            }

            let labels = match &record.labels {
                Some(labels) => Ok(labels.clone()),
                None => {
                    self.metadata
                        .labels_for(&record.kind, &record.namespace, &record.name)
                        .await
                }
            };

            match labels {
                Ok(labels) => {
                    self.cache.insert(key.clone(), labels);
                    stored.insert(key);
                    report.entries_stored += 1;
                }
                Err(e) => {
                    report.lookups_failed += 1;
                    self.metrics.inc_lookup_errors();
                    warn!(
                        cluster_id = %cluster_id,
                        kind = %record.kind,
                        namespace = %record.namespace,
                        identifier = %record.name,
                        error = %e,
                        "Failed to fetch workload labels"
                    );
                }
            }
        }

        for namespace in namespaces {
            let labels = match costs.namespace_labels.get(namespace) {
                Some(labels) => Ok(labels.clone()),
                None => {
                    self.metadata
                        .labels_for(&ResourceKind::Namespace, namespace, namespace)
                        .await
                }
            };

            match labels {
                Ok(labels) => {
                    self.cache.insert(LabelKey::namespace(cluster_id, namespace), labels);
                    report.entries_stored += 1;
                }
                Err(e) => {
                    report.lookups_failed += 1;
                    self.metrics.inc_lookup_errors();
                    warn!(
                        cluster_id = %cluster_id,
                        namespace = %namespace,
                        error = %e,
                        "Failed to fetch namespace labels"
                    );
                }
            }
        }
    }

    /// Run passes every `period` until `shutdown` fires
    ///
    /// The first pass starts immediately. A pass in flight when shutdown
    /// arrives is allowed to finish.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = period.as_secs(),
            clusters = self.clusters.len(),
            "Starting label population loop"
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.populate_once().await;
                    passes += 1;

                    if passes == 1 {
                        self.health.set_ready(true).await;
                        info!(entries = self.cache.len(), "Label cache warmed, exporter ready");
                    }
                }
                _ = shutdown.recv() => {
                    info!(passes = passes, "Shutting down label population loop");
                    break;
                }
            }
        }
    }

    /// Spawn the population loop on the runtime
    ///
    /// A zero interval is rejected instead of reaching the timer.
    pub fn spawn(self: Arc<Self>, period: Duration) -> Result<PopulationHandle, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::InvalidInterval {
                name: "population_interval_secs",
            });
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(period, shutdown_rx));

        Ok(PopulationHandle { shutdown_tx, task })
    }
}

/// Handle to a running population loop
pub struct PopulationHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl PopulationHandle {
    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) {
        // The loop may already be gone; nothing to signal then
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.task.await {
            warn!(error = %e, "Label population task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
