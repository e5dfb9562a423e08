//! Metadata source for workload and namespace labels
//!
//! Label lookups are slow and rate-limited, so they only happen from the
//! label populator, never from a scrape.

use crate::error::MetadataError;
use crate::models::{Labels, ResourceKind};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Source of identity labels for cluster resources
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Labels of the resource of `kind` named `identifier` in `namespace`
    ///
    /// For [`ResourceKind::Namespace`] the identifier is the namespace name.
    async fn labels_for(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        identifier: &str,
    ) -> Result<Labels, MetadataError>;
}

/// Reads labels straight from the Kubernetes API
#[derive(Clone)]
pub struct KubeMetadataClient {
    client: Client,
}

impl KubeMetadataClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration or the local kubeconfig
    pub async fn try_default() -> Result<Self, MetadataError> {
        Ok(Self::new(Client::try_default().await?))
    }

    async fn namespaced_labels<K>(&self, namespace: &str, name: &str) -> Result<Labels, MetadataError>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let object = api.get(name).await?;
        Ok(object.labels().clone())
    }
}

#[async_trait]
impl MetadataClient for KubeMetadataClient {
    async fn labels_for(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        identifier: &str,
    ) -> Result<Labels, MetadataError> {
        debug!(kind = %kind, namespace = %namespace, identifier = %identifier, "Fetching labels from kube api");

        match kind {
            ResourceKind::Namespace => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let object = api.get(identifier).await?;
                Ok(object.labels().clone())
            }
            ResourceKind::Deployment => self.namespaced_labels::<Deployment>(namespace, identifier).await,
            ResourceKind::StatefulSet => self.namespaced_labels::<StatefulSet>(namespace, identifier).await,
            ResourceKind::DaemonSet => self.namespaced_labels::<DaemonSet>(namespace, identifier).await,
            ResourceKind::Job => self.namespaced_labels::<Job>(namespace, identifier).await,
            other => Err(MetadataError::UnsupportedKind(other.clone())),
        }
    }
}

/// Metadata source for deployments where the billing payload carries labels
///
/// Every lookup fails, so only inline labels ever reach the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineMetadataClient;

#[async_trait]
impl MetadataClient for InlineMetadataClient {
    async fn labels_for(
        &self,
        _kind: &ResourceKind,
        _namespace: &str,
        _identifier: &str,
    ) -> Result<Labels, MetadataError> {
        Err(MetadataError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inline_client_never_resolves() {
        let client = InlineMetadataClient;
        let err = client
            .labels_for(&ResourceKind::Deployment, "ns", "web")
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Unavailable));
    }
}
