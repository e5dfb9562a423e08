//! Mapping of Kubernetes resource labels onto Prometheus labels
//!
//! A specification like `team,app.kubernetes.io/name=app` exports the `team`
//! resource label as `team` and `app.kubernetes.io/name` as `app`.

use crate::error::ConfigError;
use crate::models::Labels;
use std::fmt;
use std::str::FromStr;

const RESERVED_PREFIX: &str = "__";

/// One resource label → Prometheus label mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMapping {
    resource_label: String,
    prometheus_label: String,
}

impl LabelMapping {
    /// Create a mapping, sanitizing the Prometheus label name
    pub fn new(resource_label: &str, prometheus_label: &str) -> Result<Self, ConfigError> {
        let resource_label = resource_label.trim();
        let prometheus_label = prometheus_label.trim();

        if resource_label.is_empty() || prometheus_label.is_empty() {
            return Err(ConfigError::EmptyLabelName);
        }

        Ok(Self {
            resource_label: resource_label.to_string(),
            prometheus_label: sanitize_label_name(prometheus_label)?,
        })
    }

    pub fn resource_label(&self) -> &str {
        &self.resource_label
    }

    pub fn prometheus_label(&self) -> &str {
        &self.prometheus_label
    }
}

/// Ordered list of label mappings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMappings(Vec<LabelMapping>);

impl LabelMappings {
    /// Parse a comma-separated `resource[=prometheus]` specification
    ///
    /// A blank specification yields no mappings.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }

        input
            .split(',')
            .map(|pair| match pair.split_once('=') {
                Some((resource, prometheus)) => LabelMapping::new(resource, prometheus),
                None => LabelMapping::new(pair, pair),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Append the mappings parsed from another specification
    pub fn extend_from(&mut self, input: &str) -> Result<(), ConfigError> {
        let parsed = Self::parse(input)?;
        self.0.extend(parsed.0);
        Ok(())
    }

    /// Prometheus label names in declaration order
    pub fn label_names(&self) -> Vec<String> {
        self.0.iter().map(|m| m.prometheus_label.clone()).collect()
    }

    /// Values for the mapped labels, `""` where the resource lacks the label
    pub fn label_values(&self, labels: &Labels) -> Vec<String> {
        self.0
            .iter()
            .map(|m| labels.get(&m.resource_label).cloned().unwrap_or_default())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelMapping> {
        self.0.iter()
    }
}

impl FromStr for LabelMappings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelMappings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mapping) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", mapping.resource_label, mapping.prometheus_label)?;
        }
        Ok(())
    }
}

/// Replace characters that are invalid in a Prometheus label name with `_`
pub fn sanitize_label_name(name: &str) -> Result<String, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyLabelName);
    }

    let sanitized: String = name
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_alphabetic() || c == '_' || (c.is_ascii_digit() && i > 0) {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.starts_with(RESERVED_PREFIX) {
        return Err(ConfigError::ReservedLabelName(sanitized));
    }

    Ok(sanitized)
}
