//! Error types for the cost exporter
//!
//! Upstream and cache errors are per-entity and absorbed by the collection
//! pass. Configuration and descriptor errors are fatal at startup.

use crate::models::ResourceKind;
use crate::cache::LabelKey;
use thiserror::Error;

/// Failure talking to the billing API
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("billing API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid billing URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to decode billing response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("billing response for cluster {0} contained no result")]
    EmptyResponse(String),
}

/// Failure fetching labels from the metadata source
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("metadata lookups are disabled, labels must be carried inline")]
    Unavailable,

    #[error("no metadata lookup for resource kind {0}")]
    UnsupportedKind(ResourceKind),
}

/// No live label cache entry for the requested key
#[derive(Debug, Clone, Error)]
#[error("expected label cache to contain an entry for {key}")]
pub struct CacheMiss {
    pub key: LabelKey,
}

/// Malformed configuration, fatal before any collection begins
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("label names must not be empty")]
    EmptyLabelName,

    #[error("sanitized label name '{0}' must not start with '__'")]
    ReservedLabelName(String),

    #[error("{name} must be greater than zero")]
    InvalidInterval { name: &'static str },

    #[error("cache ttl ({ttl_secs}s) must not be shorter than the population interval ({interval_secs}s)")]
    TtlShorterThanInterval { ttl_secs: u64, interval_secs: u64 },

    #[error("unknown metadata source '{0}', expected 'kubernetes' or 'inline'")]
    UnknownMetadataSource(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Invalid gauge descriptor
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("invalid metric descriptor: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metric {metric} declares label '{label}' more than once")]
    DuplicateLabel { metric: String, label: String },
}
