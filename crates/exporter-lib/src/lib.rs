//! Cost exporter library
//!
//! This crate provides the core functionality for:
//! - Fetching per-workload cost and right-sizing data from the billing API
//! - Folding ephemeral workload names into stable series
//! - Caching workload and namespace labels ahead of collection
//! - Rendering cost as Prometheus gauges
//! - Health checks and observability

pub mod aggregator;
pub mod billing;
pub mod cache;
pub mod cardinality;
pub mod emitter;
pub mod error;
pub mod health;
pub mod mappings;
pub mod metadata;
pub mod models;
pub mod observability;
pub mod suggestions;
pub mod window;

#[cfg(test)]
mod testing;

pub use aggregator::{CollectionSummary, CostAggregator};
pub use cache::{LabelCache, LabelKey, LabelPopulator, PopulationHandle, PopulationReport};
pub use emitter::{CostMetrics, MetricBatch};
pub use error::{BillingError, CacheMiss, ConfigError, EmitterError, MetadataError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use mappings::LabelMappings;
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use suggestions::{SuggestionMetrics, SuggestionsCollector};
pub use window::BillingWindow;
