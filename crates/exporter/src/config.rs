//! Exporter configuration
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. an optional file named by `EXPORTER_CONFIG_FILE` (any format the
//!    config crate recognises from the extension)
//! 3. `EXPORTER_*` environment variables, e.g. `EXPORTER_API_TOKEN`

use exporter_lib::billing::{OceanClientConfig, DEFAULT_GROUP_BY};
use exporter_lib::{ConfigError, LabelMappings};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming the optional configuration file
pub const CONFIG_FILE_ENV: &str = "EXPORTER_CONFIG_FILE";

const ENV_PREFIX: &str = "EXPORTER";

/// Where workload and namespace labels come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// Kubernetes API, using in-cluster config or the local kubeconfig
    Kubernetes,
    /// Labels carried in the billing payload only
    Inline,
}

impl FromStr for MetadataSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" | "k8s" => Ok(MetadataSource::Kubernetes),
            "inline" => Ok(MetadataSource::Inline),
            other => Err(ConfigError::UnknownMetadataSource(other.to_string())),
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSource::Kubernetes => f.write_str("kubernetes"),
            MetadataSource::Inline => f.write_str("inline"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Name reported in lifecycle logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Port for /metrics, /healthz and /readyz
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub account_id: Option<String>,

    /// Comma-separated cluster ids; empty means every cluster of the account
    #[serde(default)]
    pub cluster_ids: String,

    /// Billing grouping key
    #[serde(default = "default_group_by_label")]
    pub group_by_label: String,

    /// Resource label mappings, `res[=prom],...`
    #[serde(default)]
    pub label_mappings: String,

    #[serde(default = "default_metric_namespace")]
    pub metric_namespace: String,

    #[serde(default = "default_metadata_source")]
    pub metadata_source: String,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_population_interval")]
    pub population_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "cost-exporter".to_string())
}

fn default_listen_port() -> u16 {
    8080
}

fn default_api_endpoint() -> String {
    "https://api.spotinst.io".to_string()
}

fn default_group_by_label() -> String {
    DEFAULT_GROUP_BY.to_string()
}

fn default_metric_namespace() -> String {
    "spotinst_ocean_aws".to_string()
}

fn default_metadata_source() -> String {
    MetadataSource::Kubernetes.to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_population_interval() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    30
}

impl ExporterConfig {
    /// Load from the file named by `EXPORTER_CONFIG_FILE`, if any, and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(path.as_deref())
    }

    /// Load from an optional file plus the environment, then validate
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder,
        };

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "population_interval_secs",
            });
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "cache_ttl_secs",
            });
        }
        // Entries must outlive the gap between two population passes
        if self.cache_ttl_secs < self.population_interval_secs {
            return Err(ConfigError::TtlShorterThanInterval {
                ttl_secs: self.cache_ttl_secs,
                interval_secs: self.population_interval_secs,
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidInterval {
                name: "request_timeout_secs",
            });
        }
        self.metadata_source()?;
        self.label_mappings()?;
        Ok(())
    }

    /// Explicitly configured cluster ids, blanks dropped
    pub fn cluster_ids(&self) -> Vec<String> {
        self.cluster_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn label_mappings(&self) -> Result<LabelMappings, ConfigError> {
        LabelMappings::parse(&self.label_mappings)
    }

    pub fn metadata_source(&self) -> Result<MetadataSource, ConfigError> {
        self.metadata_source.parse()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn population_interval(&self) -> Duration {
        Duration::from_secs(self.population_interval_secs)
    }

    pub fn ocean_client_config(&self) -> OceanClientConfig {
        OceanClientConfig {
            endpoint: self.api_endpoint.clone(),
            token: self.api_token.clone(),
            account_id: self.account_id.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
