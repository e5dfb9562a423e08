//! Core data models for the cost exporter

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label set attached to a Kubernetes resource
pub type Labels = BTreeMap<String, String>;

/// A managed cluster, fetched once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
}

impl Cluster {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Kind of resource cost is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    /// Only used as a label cache kind
    Namespace,
    /// Synthetic kind the billing source uses for cost it cannot attribute
    Unattributed,
    Other(String),
}

impl ResourceKind {
    /// Parse a kind as reported by the billing source (case-insensitive)
    ///
    /// Unrecognised kinds are kept lower-cased, so `CronJob` and `cronjob`
    /// name the same kind.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.as_str() {
            "deployment" => ResourceKind::Deployment,
            "statefulset" => ResourceKind::StatefulSet,
            "daemonset" => ResourceKind::DaemonSet,
            "job" => ResourceKind::Job,
            "namespace" => ResourceKind::Namespace,
            s if s.starts_with("unattributed") => ResourceKind::Unattributed,
            _ => ResourceKind::Other(lower.clone()),
        }
    }

    /// Canonical kind name
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Job => "Job",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Unattributed => "Unattributed",
            ResourceKind::Other(kind) => kind,
        }
    }

    /// Value of the `workload` metric label
    pub fn workload_label(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether cost of this kind is attributed to a workload
    pub fn is_workload(&self) -> bool {
        !matches!(self, ResourceKind::Namespace | ResourceKind::Unattributed)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ResourceKind::parse(&raw))
    }
}

/// One row of billing data for a single workload instance in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub total: f64,
    pub storage: f64,
    pub compute: f64,
    /// Labels carried inline by the billing payload, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
}

impl CostRecord {
    pub fn new(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        total: f64,
        storage: f64,
        compute: f64,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace: namespace.into(),
            total,
            storage,
            compute,
            labels: None,
        }
    }

    /// Network cost is the residual of the independently reported components
    pub fn network(&self) -> f64 {
        self.total - self.storage - self.compute
    }
}

/// Billing response for one cluster and window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterCostReport {
    pub total_cost: f64,
    pub records: Vec<CostRecord>,
    /// Namespace labels carried inline by the billing payload, if any
    #[serde(default)]
    pub namespace_labels: BTreeMap<String, Labels>,
}

/// Right-sizing suggestion for a single workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSuggestion {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub requested_cpu: f64,
    pub suggested_cpu: f64,
    pub requested_memory: f64,
    pub suggested_memory: f64,
    #[serde(default)]
    pub containers: Vec<ContainerSuggestion>,
}

/// Right-sizing suggestion for one container of a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSuggestion {
    pub name: String,
    pub requested_cpu: f64,
    pub suggested_cpu: f64,
    pub requested_memory: f64,
    pub suggested_memory: f64,
}
