//! Cost Exporter - per-workload Kubernetes cost as Prometheus gauges
//!
//! Runs as a single Deployment. Cost is fetched from the billing API on
//! every scrape; workload and namespace labels are refreshed in the
//! background from the metadata source.

use anyhow::{Context, Result};
use cost_exporter::{
    api,
    config::{ExporterConfig, MetadataSource},
};
use exporter_lib::{
    billing::{BillingClient, OceanClient},
    health::{components, HealthRegistry},
    metadata::{InlineMetadataClient, KubeMetadataClient, MetadataClient},
    Cluster, CostAggregator, CostMetrics, LabelCache, LabelPopulator, StructuredLogger,
    SuggestionMetrics, SuggestionsCollector,
};
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cost-exporter");

    let config = ExporterConfig::load().context("failed to load configuration")?;
    let metadata_source = config.metadata_source()?;
    info!(
        instance = %config.instance_name,
        endpoint = %config.api_endpoint,
        metadata_source = %metadata_source,
        "Exporter configured"
    );

    let billing = Arc::new(
        OceanClient::new(config.ocean_client_config()).context("failed to build billing client")?,
    );
    let clusters = resolve_clusters(&config, billing.as_ref()).await?;

    let metadata: Arc<dyn MetadataClient> = match metadata_source {
        MetadataSource::Kubernetes => Arc::new(
            KubeMetadataClient::try_default()
                .await
                .context("failed to connect to the kubernetes API")?,
        ),
        MetadataSource::Inline => Arc::new(InlineMetadataClient),
    };

    let health_registry = HealthRegistry::new();
    health_registry.register(components::BILLING).await;
    health_registry.register(components::LABEL_CACHE).await;

    let logger = StructuredLogger::new(&config.instance_name);
    let cache = Arc::new(LabelCache::new(config.cache_ttl()));

    let populator = Arc::new(
        LabelPopulator::new(cache.clone(), billing.clone(), metadata, clusters.clone())
            .with_group_by(&config.group_by_label)
            .with_health(health_registry.clone())
            .with_logger(logger.clone()),
    );
    let population = populator.spawn(config.population_interval())?;

    let cost_metrics = CostMetrics::new(&config.metric_namespace, config.label_mappings()?)
        .context("invalid cost metric descriptors")?;
    let aggregator = CostAggregator::new(billing.clone(), cache, clusters.clone(), cost_metrics)
        .with_group_by(&config.group_by_label)
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let suggestion_metrics = SuggestionMetrics::new(&config.metric_namespace)
        .context("invalid suggestion metric descriptors")?;
    let suggestions = SuggestionsCollector::new(billing, clusters.clone(), suggestion_metrics);

    let app_state = Arc::new(
        api::AppState::new(health_registry, Arc::new(aggregator))
            .with_suggestions(Arc::new(suggestions)),
    );

    logger.log_startup(EXPORTER_VERSION, clusters.len(), &metadata_source.to_string());

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
    let mut server = tokio::spawn(api::serve(config.listen_port, app_state, async move {
        let _ = shutdown_rx.recv().await;
    }));

    // A server that stops on its own (bind failure, accept error) ends the process
    let stopped = tokio::select! {
        reason = shutdown_signal() => Ok(reason),
        result = &mut server => Err(result),
    };
    let reason = match stopped {
        Ok(reason) => reason,
        Err(result) => {
            logger.log_shutdown("API server stopped");
            population.stop().await;
            result.context("API server task panicked")??;
            anyhow::bail!("API server stopped unexpectedly");
        }
    };
    logger.log_shutdown(reason);

    let _ = shutdown_tx.send(());
    population.stop().await;
    server.await.context("API server task panicked")??;

    info!("Shutdown complete");
    Ok(())
}

/// Clusters to export: the configured ids, or every cluster of the account
async fn resolve_clusters(config: &ExporterConfig, billing: &dyn BillingClient) -> Result<Vec<Cluster>> {
    let ids = config.cluster_ids();
    let listed = billing.list_clusters().await;

    if ids.is_empty() {
        let clusters = listed.context("failed to list clusters")?;
        info!(clusters = clusters.len(), "Exporting every cluster of the account");
        return Ok(clusters);
    }

    // Display names are best effort when ids are configured explicitly
    let known = listed.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to list clusters, using ids as names");
        Vec::new()
    });

    Ok(ids
        .into_iter()
        .map(|id| {
            let name = known
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| id.clone());
            Cluster::new(id, name)
        })
        .collect())
}

async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
