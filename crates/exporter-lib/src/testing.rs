//! In-crate fakes for the billing and metadata sources

use crate::billing::{AggregatedCostRequest, BillingClient, SuggestionsClient};
use crate::error::{BillingError, MetadataError};
use crate::models::{Cluster, ClusterCostReport, CostRecord, Labels, ResourceKind, ResourceSuggestion};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub(crate) fn record(kind: ResourceKind, namespace: &str, name: &str, total: f64) -> CostRecord {
    CostRecord::new(kind, namespace, name, total, 0.0, 0.0)
}

/// Billing source answering from canned reports; unknown clusters fail
#[derive(Default)]
pub(crate) struct MockBillingClient {
    reports: HashMap<String, ClusterCostReport>,
    suggestions: HashMap<String, Vec<ResourceSuggestion>>,
    pub requests: Mutex<Vec<AggregatedCostRequest>>,
}

impl MockBillingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, cluster_id: &str, report: ClusterCostReport) -> Self {
        self.reports.insert(cluster_id.to_string(), report);
        self
    }

    pub fn with_suggestions(mut self, cluster_id: &str, suggestions: Vec<ResourceSuggestion>) -> Self {
        self.suggestions.insert(cluster_id.to_string(), suggestions);
        self
    }
}

#[async_trait]
impl BillingClient for MockBillingClient {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, BillingError> {
        Ok(self.reports.keys().map(|id| Cluster::new(id, id)).collect())
    }

    async fn cluster_aggregated_cost(
        &self,
        request: &AggregatedCostRequest,
    ) -> Result<ClusterCostReport, BillingError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reports
            .get(&request.cluster_id)
            .cloned()
            .ok_or_else(|| BillingError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            })
    }
}

#[async_trait]
impl SuggestionsClient for MockBillingClient {
    async fn list_resource_suggestions(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<ResourceSuggestion>, BillingError> {
        self.suggestions
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| BillingError::EmptyResponse(cluster_id.to_string()))
    }
}

/// Metadata source answering from a fixed table; unknown resources fail
#[derive(Default)]
pub(crate) struct MockMetadataClient {
    labels: HashMap<(ResourceKind, String, String), Labels>,
    pub lookups: Mutex<Vec<(ResourceKind, String, String)>>,
}

impl MockMetadataClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels(mut self, kind: ResourceKind, namespace: &str, identifier: &str, pairs: &[(&str, &str)]) -> Self {
        self.labels.insert(
            (kind, namespace.to_string(), identifier.to_string()),
            labels(pairs),
        );
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl crate::metadata::MetadataClient for MockMetadataClient {
    async fn labels_for(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        identifier: &str,
    ) -> Result<Labels, MetadataError> {
        let key = (kind.clone(), namespace.to_string(), identifier.to_string());
        self.lookups.lock().unwrap().push(key.clone());
        self.labels.get(&key).cloned().ok_or(MetadataError::Unavailable)
    }
}
