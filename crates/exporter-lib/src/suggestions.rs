//! Right-sizing suggestion gauges
//!
//! Suggestions are exported one-to-one: no reduction, no label cache.

use crate::billing::SuggestionsClient;
use crate::emitter::{GaugeDescriptor, MetricBatch};
use crate::error::EmitterError;
use crate::models::{Cluster, ResourceSuggestion};
use std::sync::Arc;
use tracing::warn;

const WORKLOAD_LABELS: &[&str] = &["ocean_id", "ocean_name", "workload", "namespace", "name"];

/// Requested and suggested values of one resource
#[derive(Debug, Clone)]
pub struct ResourceGauges {
    pub requested: GaugeDescriptor,
    pub suggested: GaugeDescriptor,
}

impl ResourceGauges {
    fn new(namespace: &str, prefix: &str, resource: &str, scope: &str, labels: &[&str]) -> Result<Self, EmitterError> {
        let label_names: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        Ok(Self {
            requested: GaugeDescriptor::new(
                namespace,
                &format!("{prefix}_{resource}_requested"),
                &format!("Requested {resource} of a {scope}"),
                label_names.clone(),
            )?,
            suggested: GaugeDescriptor::new(
                namespace,
                &format!("{prefix}_{resource}_suggested"),
                &format!("Suggested {resource} of a {scope}"),
                label_names,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SuggestionMetrics {
    pub cpu: ResourceGauges,
    pub memory: ResourceGauges,
    pub container_cpu: ResourceGauges,
    pub container_memory: ResourceGauges,
}

impl SuggestionMetrics {
    pub fn new(namespace: &str) -> Result<Self, EmitterError> {
        let container_labels: Vec<&str> = WORKLOAD_LABELS.iter().copied().chain(["container"]).collect();

        Ok(Self {
            cpu: ResourceGauges::new(namespace, "workload", "cpu", "workload", WORKLOAD_LABELS)?,
            memory: ResourceGauges::new(namespace, "workload", "memory", "workload", WORKLOAD_LABELS)?,
            container_cpu: ResourceGauges::new(
                namespace,
                "workload_container",
                "cpu",
                "workload container",
                &container_labels,
            )?,
            container_memory: ResourceGauges::new(
                namespace,
                "workload_container",
                "memory",
                "workload container",
                &container_labels,
            )?,
        })
    }
}

pub struct SuggestionsCollector {
    client: Arc<dyn SuggestionsClient>,
    clusters: Vec<Cluster>,
    metrics: SuggestionMetrics,
}

impl SuggestionsCollector {
    pub fn new(client: Arc<dyn SuggestionsClient>, clusters: Vec<Cluster>, metrics: SuggestionMetrics) -> Self {
        Self {
            client,
            clusters,
            metrics,
        }
    }

    pub fn metrics(&self) -> &SuggestionMetrics {
        &self.metrics
    }

    /// Fetch suggestions for every cluster; failed clusters are skipped
    pub async fn collect(&self) -> MetricBatch {
        let mut batch = MetricBatch::new();

        for cluster in &self.clusters {
            match self.client.list_resource_suggestions(&cluster.id).await {
                Ok(suggestions) => {
                    for suggestion in &suggestions {
                        self.emit(cluster, suggestion, &mut batch);
                    }
                }
                Err(e) => {
                    warn!(cluster_id = %cluster.id, error = %e, "Failed to fetch right-sizing suggestions");
                }
            }
        }

        batch
    }

    fn emit(&self, cluster: &Cluster, suggestion: &ResourceSuggestion, batch: &mut MetricBatch) {
        let labels = vec![
            cluster.id.clone(),
            cluster.name.clone(),
            suggestion.kind.workload_label(),
            suggestion.namespace.clone(),
            suggestion.name.clone(),
        ];

        let m = &self.metrics;
        batch.push(&m.cpu.requested, suggestion.requested_cpu, labels.clone());
        batch.push(&m.cpu.suggested, suggestion.suggested_cpu, labels.clone());
        batch.push(&m.memory.requested, suggestion.requested_memory, labels.clone());
        batch.push(&m.memory.suggested, suggestion.suggested_memory, labels.clone());

        for container in &suggestion.containers {
            let mut labels = labels.clone();
            labels.push(container.name.clone());

            batch.push(&m.container_cpu.requested, container.requested_cpu, labels.clone());
            batch.push(&m.container_cpu.suggested, container.suggested_cpu, labels.clone());
            batch.push(&m.container_memory.requested, container.requested_memory, labels.clone());
            batch.push(&m.container_memory.suggested, container.suggested_memory, labels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerSuggestion, ResourceKind};
    use crate::testing::MockBillingClient;

    fn suggestion() -> ResourceSuggestion {
        ResourceSuggestion {
            kind: ResourceKind::Deployment,
            namespace: "shop".to_string(),
            name: "web".to_string(),
            requested_cpu: 500.0,
            suggested_cpu: 250.0,
            requested_memory: 1024.0,
            suggested_memory: 768.0,
            containers: vec![ContainerSuggestion {
                name: "nginx".to_string(),
                requested_cpu: 400.0,
                suggested_cpu: 200.0,
                requested_memory: 512.0,
                suggested_memory: 384.0,
            }],
        }
    }

    #[test]
    fn test_descriptor_names() {
        let metrics = SuggestionMetrics::new("ocean").unwrap();
        assert_eq!(metrics.cpu.requested.fq_name(), "ocean_workload_cpu_requested");
        assert_eq!(metrics.memory.suggested.fq_name(), "ocean_workload_memory_suggested");
        assert_eq!(
            metrics.container_cpu.suggested.fq_name(),
            "ocean_workload_container_cpu_suggested"
        );
        assert_eq!(metrics.container_memory.requested.label_names().last().unwrap(), "container");
    }

    #[tokio::test]
    async fn test_suggestions_exported_one_to_one() {
        let billing = MockBillingClient::new().with_suggestions("c1", vec![suggestion()]);
        let collector = SuggestionsCollector::new(
            Arc::new(billing),
            vec![Cluster::new("c1", "prod"), Cluster::new("c2", "missing")],
            SuggestionMetrics::new("ocean").unwrap(),
        );

        let batch = collector.collect().await;

        assert_eq!(batch.len(), 8);
        let cpu = batch.samples("ocean_workload_cpu_suggested");
        assert_eq!(cpu.len(), 1);
        assert_eq!(cpu[0].value, 250.0);
        assert_eq!(cpu[0].label_values, vec!["c1", "prod", "deployment", "shop", "web"]);

        let container = batch.samples("ocean_workload_container_memory_requested");
        assert_eq!(container[0].value, 512.0);
        assert_eq!(
            container[0].label(&collector.metrics().container_memory.requested, "container"),
            Some("nginx")
        );
    }
}
