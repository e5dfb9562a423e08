//! HTTP client for the Ocean billing and right-sizing API

use super::{AggregatedCostRequest, BillingClient, SuggestionsClient};
use crate::error::BillingError;
use crate::models::{
    Cluster, ClusterCostReport, ContainerSuggestion, CostRecord, Labels, ResourceKind,
    ResourceSuggestion,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration for [`OceanClient`]
#[derive(Debug, Clone)]
pub struct OceanClientConfig {
    /// API base URL (e.g., "https://api.spotinst.io")
    pub endpoint: String,
    /// Bearer token
    pub token: Option<String>,
    /// Account the clusters belong to
    pub account_id: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for OceanClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.spotinst.io".to_string(),
            token: None,
            account_id: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Billing and suggestions client backed by the Ocean REST API
pub struct OceanClient {
    client: Client,
    base_url: Url,
    config: OceanClientConfig,
}

impl OceanClient {
    /// Create a new client
    pub fn new(config: OceanClientConfig) -> Result<Self, BillingError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        let base_url = Url::parse(&config.endpoint)?;
        if base_url.cannot_be_a_base() {
            return Err(BillingError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if let Some(account_id) = &self.config.account_id {
            url.query_pairs_mut().append_pair("accountId", account_id);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Vec<T>, BillingError> {
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.response.items)
    }
}

#[async_trait]
impl BillingClient for OceanClient {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, BillingError> {
        let url = self.url(&["ocean", "aws", "k8s", "cluster"]);
        let items: Vec<ClusterItem> = self.send(self.request(Method::GET, url)).await?;

        Ok(items
            .into_iter()
            .map(|item| Cluster::new(item.id, item.name))
            .collect())
    }

    async fn cluster_aggregated_cost(
        &self,
        request: &AggregatedCostRequest,
    ) -> Result<ClusterCostReport, BillingError> {
        let url = self.url(&[
            "ocean",
            "aws",
            "k8s",
            "cluster",
            &request.cluster_id,
            "aggregatedCosts",
        ]);
        let body = AggregatedCostBody {
            start_time: request.window.start_date(),
            end_time: request.window.end_date(),
            group_by: request.group_by.clone(),
        };

        debug!(
            cluster_id = %request.cluster_id,
            window = %request.window,
            group_by = %request.group_by,
            "Requesting aggregated cluster cost"
        );

        let items: Vec<AggregatedCostItem> =
            self.send(self.request(Method::POST, url).json(&body)).await?;

        // The aggregation yields exactly one result per cluster
        let item = items
            .into_iter()
            .next()
            .ok_or_else(|| BillingError::EmptyResponse(request.cluster_id.clone()))?;

        Ok(item.into_report())
    }
}

#[async_trait]
impl SuggestionsClient for OceanClient {
    async fn list_resource_suggestions(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<ResourceSuggestion>, BillingError> {
        let url = self.url(&[
            "ocean",
            "aws",
            "k8s",
            "cluster",
            cluster_id,
            "rightSizing",
            "suggestion",
        ]);
        let items: Vec<SuggestionItem> = self
            .send(self.request(Method::POST, url).json(&serde_json::json!({})))
            .await?;

        Ok(items.into_iter().map(SuggestionItem::into_suggestion).collect())
    }
}

// Wire types

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: EnvelopeResponse<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ClusterItem {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedCostBody {
    start_time: String,
    end_time: String,
    group_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedCostItem {
    result: AggregatedResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedResult {
    total_for_duration: TotalForDuration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalForDuration {
    #[serde(default)]
    summary: Summary,
    #[serde(default)]
    detailed_costs: DetailedCosts,
}

#[derive(Debug, Default, Deserialize)]
struct Summary {
    #[serde(default)]
    total: f64,
}

#[derive(Debug, Default, Deserialize)]
struct DetailedCosts {
    #[serde(default)]
    aggregations: BTreeMap<String, Aggregation>,
}

#[derive(Debug, Deserialize)]
struct Aggregation {
    #[serde(default)]
    resources: Vec<AggregatedResource>,
}

#[derive(Debug, Deserialize)]
struct AggregatedResource {
    metadata: ResourceMetadata,
    #[serde(default)]
    total: f64,
    #[serde(default)]
    storage: CostComponent,
    #[serde(default)]
    compute: CostComponent,
    #[serde(default)]
    labels: Option<Labels>,
}

#[derive(Debug, Deserialize)]
struct ResourceMetadata {
    name: String,
    namespace: String,
    #[serde(rename = "type")]
    kind: ResourceKind,
}

#[derive(Debug, Default, Deserialize)]
struct CostComponent {
    #[serde(default)]
    total: f64,
}

impl AggregatedCostItem {
    fn into_report(self) -> ClusterCostReport {
        let totals = self.result.total_for_duration;
        let records = totals
            .detailed_costs
            .aggregations
            .into_values()
            .flat_map(|aggregation| aggregation.resources)
            .map(|resource| CostRecord {
                kind: resource.metadata.kind,
                name: resource.metadata.name,
                namespace: resource.metadata.namespace,
                total: resource.total,
                storage: resource.storage.total,
                compute: resource.compute.total,
                labels: resource.labels,
            })
            .collect();

        ClusterCostReport {
            total_cost: totals.summary.total,
            records,
            namespace_labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionItem {
    resource_name: String,
    resource_type: ResourceKind,
    namespace: String,
    #[serde(default, rename = "requestedCPU")]
    requested_cpu: f64,
    #[serde(default, rename = "suggestedCPU")]
    suggested_cpu: f64,
    #[serde(default)]
    requested_memory: f64,
    #[serde(default)]
    suggested_memory: f64,
    #[serde(default)]
    containers: Vec<ContainerItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerItem {
    name: String,
    #[serde(default, rename = "requestedCPU")]
    requested_cpu: f64,
    #[serde(default, rename = "suggestedCPU")]
    suggested_cpu: f64,
    #[serde(default)]
    requested_memory: f64,
    #[serde(default)]
    suggested_memory: f64,
}

impl SuggestionItem {
    fn into_suggestion(self) -> ResourceSuggestion {
        ResourceSuggestion {
            kind: self.resource_type,
            namespace: self.namespace,
            name: self.resource_name,
            requested_cpu: self.requested_cpu,
            suggested_cpu: self.suggested_cpu,
            requested_memory: self.requested_memory,
            suggested_memory: self.suggested_memory,
            containers: self
                .containers
                .into_iter()
                .map(|c| ContainerSuggestion {
                    name: c.name,
                    requested_cpu: c.requested_cpu,
                    suggested_cpu: c.suggested_cpu,
                    requested_memory: c.requested_memory,
                    suggested_memory: c.suggested_memory,
                })
                .collect(),
        }
    }
}
