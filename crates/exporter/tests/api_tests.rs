//! Integration tests for the exporter API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use cost_exporter::api::{create_router, serve, AppState};
use exporter_lib::{
    billing::{AggregatedCostRequest, BillingClient, SuggestionsClient},
    health::components,
    BillingError, Cluster, ClusterCostReport, CostAggregator, CostMetrics, CostRecord,
    HealthRegistry, LabelCache, LabelKey, Labels, LabelMappings, ResourceKind, ResourceSuggestion,
    SuggestionMetrics, SuggestionsCollector,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Billing source with one healthy cluster ("c1"); every other cluster fails
struct StaticBilling;

#[async_trait]
impl BillingClient for StaticBilling {
    async fn list_clusters(&self) -> Result<Vec<Cluster>, BillingError> {
        Ok(vec![Cluster::new("c1", "prod")])
    }

    async fn cluster_aggregated_cost(
        &self,
        request: &AggregatedCostRequest,
    ) -> Result<ClusterCostReport, BillingError> {
        if request.cluster_id != "c1" {
            return Err(BillingError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }

        Ok(ClusterCostReport {
            total_cost: 25.0,
            records: vec![
                CostRecord::new(ResourceKind::Deployment, "shop", "web", 10.0, 4.0, 5.0),
                CostRecord::new(ResourceKind::Job, "shop", "report-27752145", 7.0, 0.0, 7.0),
            ],
            namespace_labels: BTreeMap::new(),
        })
    }
}

#[async_trait]
impl SuggestionsClient for StaticBilling {
    async fn list_resource_suggestions(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<ResourceSuggestion>, BillingError> {
        Ok(vec![ResourceSuggestion {
            kind: ResourceKind::Deployment,
            namespace: "shop".to_string(),
            name: format!("web-{cluster_id}"),
            requested_cpu: 1000.0,
            suggested_cpu: 300.0,
            requested_memory: 2048.0,
            suggested_memory: 1024.0,
            containers: Vec::new(),
        }])
    }
}

fn seeded_cache() -> Arc<LabelCache> {
    let cache = Arc::new(LabelCache::default());
    let team = |value: &str| -> Labels { [("team".to_string(), value.to_string())].into_iter().collect() };
    cache.insert(LabelKey::new("c1", ResourceKind::Deployment, "shop", "web"), team("storefront"));
    cache.insert(LabelKey::namespace("c1", "shop"), team("commerce"));
    cache
}

async fn setup_test_app(clusters: Vec<Cluster>) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::BILLING).await;
    health_registry.register(components::LABEL_CACHE).await;

    let billing = Arc::new(StaticBilling);
    let metrics = CostMetrics::new("ocean", LabelMappings::parse("team").unwrap()).unwrap();
    let aggregator = CostAggregator::new(billing.clone(), seeded_cache(), clusters.clone(), metrics)
        .with_health(health_registry.clone());
    let suggestions = SuggestionsCollector::new(billing, clusters, SuggestionMetrics::new("ocean").unwrap());

    let state = Arc::new(
        AppState::new(health_registry, Arc::new(aggregator)).with_suggestions(Arc::new(suggestions)),
    );
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;
    state
        .health_registry
        .set_degraded(components::BILLING, "1 of 2 clusters failed")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;
    state
        .health_registry
        .set_unhealthy(components::LABEL_CACHE, "all 1 clusters failed")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(
        health["components"]["label_cache"]["message"],
        "all 1 clusters failed"
    );
}

#[tokio::test]
async fn test_readyz_gated_on_population() {
    let (app, state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;

    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_renders_cost_gauges() {
    let (app, _state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; version=0.0.4"
    );

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    // Exposition sorts labels by name
    assert!(body.contains(r#"ocean_cluster_cost{ocean_id="c1",ocean_name="prod"} 25"#));
    assert!(body.contains(
        r#"ocean_workload_cost{name="web",namespace="shop",ocean_id="c1",ocean_name="prod",team="storefront",workload="deployment"} 10"#
    ));
    assert!(body.contains(
        r#"ocean_workload_resource_cost{name="web",namespace="shop",ocean_id="c1",ocean_name="prod",resource="network",team="storefront",workload="deployment"} 1"#
    ));
    // The job has no cached labels: no workload sample, but it counts toward the namespace
    assert!(!body.contains(r#"name="report""#));
    assert!(body.contains(
        r#"ocean_namespace_cost{namespace="shop",ocean_id="c1",ocean_name="prod",team="commerce"} 17"#
    ));
    assert!(body.contains(r#"ocean_workload_cpu_suggested{name="web-c1",namespace="shop",ocean_id="c1",ocean_name="prod",workload="deployment"} 300"#));
    assert!(body.contains("cost_exporter_collection_duration_seconds"));
}

#[tokio::test]
async fn test_metrics_returns_200_when_every_cluster_fails() {
    let (app, state) = setup_test_app(vec![Cluster::new("c9", "gone")]).await;

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("ocean_cluster_cost"));

    let health = state.health_registry.health().await;
    assert_eq!(
        health.components[components::BILLING].status,
        exporter_lib::ComponentStatus::Unhealthy
    );
}

#[tokio::test]
async fn test_serve_fails_when_port_is_taken() {
    let occupied = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();
    let (_, state) = setup_test_app(vec![Cluster::new("c1", "prod")]).await;

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        serve(port, state, std::future::pending::<()>()),
    )
    .await
    .expect("serve should return instead of waiting for shutdown");

    assert!(result.is_err());
}
