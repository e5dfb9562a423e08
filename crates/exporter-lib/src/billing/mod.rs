//! Billing source clients
//!
//! The collection pass and the label populator only depend on the
//! [`BillingClient`] and [`SuggestionsClient`] traits; [`OceanClient`] is the
//! HTTP implementation used in production.

mod ocean;

pub use ocean::{OceanClient, OceanClientConfig};

use crate::error::BillingError;
use crate::models::{Cluster, ClusterCostReport, ResourceSuggestion};
use crate::window::BillingWindow;
use async_trait::async_trait;

/// Default grouping: the standard Kubernetes application name label
pub const DEFAULT_GROUP_BY: &str = "resource.label.app.kubernetes.io/name";

/// Request for the aggregated cost of one cluster over one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedCostRequest {
    pub cluster_id: String,
    pub window: BillingWindow,
    pub group_by: String,
}

impl AggregatedCostRequest {
    pub fn new(cluster_id: impl Into<String>, window: BillingWindow, group_by: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            window,
            group_by: group_by.into(),
        }
    }
}

/// Source of per-workload cost data
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// List the clusters visible to the configured account
    async fn list_clusters(&self) -> Result<Vec<Cluster>, BillingError>;

    /// Fetch aggregated cost for one cluster and window
    async fn cluster_aggregated_cost(
        &self,
        request: &AggregatedCostRequest,
    ) -> Result<ClusterCostReport, BillingError>;
}

/// Source of right-sizing suggestions
#[async_trait]
pub trait SuggestionsClient: Send + Sync {
    async fn list_resource_suggestions(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<ResourceSuggestion>, BillingError>;
}
