//! Gauge descriptors and per-pass sample batches
//!
//! Descriptors are declared once at startup. Every collection pass fills a
//! fresh [`MetricBatch`], so concurrent scrapes never share sample state.

use crate::error::EmitterError;
use crate::mappings::LabelMappings;
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, TextEncoder};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Name, help text and ordered label names of one gauge stream
#[derive(Debug, Clone)]
pub struct GaugeDescriptor {
    fq_name: String,
    opts: Opts,
    label_names: Vec<String>,
}

impl GaugeDescriptor {
    /// Declare a gauge; invalid or duplicate label names are rejected
    pub fn new(
        namespace: &str,
        name: &str,
        help: &str,
        label_names: Vec<String>,
    ) -> Result<Self, EmitterError> {
        let opts = Opts::new(name, help).namespace(namespace);
        let fq_name = opts.fq_name();

        for (i, label) in label_names.iter().enumerate() {
            if label_names[..i].contains(label) {
                return Err(EmitterError::DuplicateLabel {
                    metric: fq_name,
                    label: label.clone(),
                });
            }
        }

        // Validates the metric and label names
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        GaugeVec::new(opts.clone(), &names)?;

        Ok(Self {
            fq_name,
            opts,
            label_names,
        })
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.opts.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }
}

/// Cost gauges, with the configured resource labels appended
#[derive(Debug, Clone)]
pub struct CostMetrics {
    pub cluster_cost: GaugeDescriptor,
    pub namespace_cost: GaugeDescriptor,
    pub workload_cost: GaugeDescriptor,
    pub resource_cost: GaugeDescriptor,
    mappings: LabelMappings,
}

impl CostMetrics {
    pub fn new(namespace: &str, mappings: LabelMappings) -> Result<Self, EmitterError> {
        let with_mapped = |fixed: &[&str]| -> Vec<String> {
            fixed
                .iter()
                .map(|s| s.to_string())
                .chain(mappings.label_names())
                .collect()
        };

        Ok(Self {
            cluster_cost: GaugeDescriptor::new(
                namespace,
                "cluster_cost",
                "Total cost of a cluster",
                vec!["ocean_id".to_string(), "ocean_name".to_string()],
            )?,
            namespace_cost: GaugeDescriptor::new(
                namespace,
                "namespace_cost",
                "Total cost of a namespace",
                with_mapped(&["ocean_id", "ocean_name", "namespace"]),
            )?,
            workload_cost: GaugeDescriptor::new(
                namespace,
                "workload_cost",
                "Total cost of a workload",
                with_mapped(&["ocean_id", "ocean_name", "namespace", "name", "workload"]),
            )?,
            resource_cost: GaugeDescriptor::new(
                namespace,
                "workload_resource_cost",
                "Total cost for the given resource of a workload",
                with_mapped(&[
                    "ocean_id",
                    "ocean_name",
                    "namespace",
                    "name",
                    "workload",
                    "resource",
                ]),
            )?,
            mappings,
        })
    }

    pub fn mappings(&self) -> &LabelMappings {
        &self.mappings
    }

    pub fn descriptors(&self) -> [&GaugeDescriptor; 4] {
        [
            &self.cluster_cost,
            &self.namespace_cost,
            &self.workload_cost,
            &self.resource_cost,
        ]
    }
}

/// One gauge sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    /// Value of the label `name` according to `descriptor`
    pub fn label<'a>(&'a self, descriptor: &GaugeDescriptor, name: &str) -> Option<&'a str> {
        descriptor
            .label_names()
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct FamilySamples {
    descriptor: GaugeDescriptor,
    samples: Vec<Sample>,
}

/// Samples gathered during one collection pass
#[derive(Debug, Clone, Default)]
pub struct MetricBatch {
    families: BTreeMap<String, FamilySamples>,
}

impl MetricBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample; label values must follow the descriptor's label order
    ///
    /// Returns false, and drops the sample, if the number of values does not
    /// match the descriptor.
    pub fn push(&mut self, descriptor: &GaugeDescriptor, value: f64, label_values: Vec<String>) -> bool {
        if label_values.len() != descriptor.label_names.len() {
            warn!(
                metric = %descriptor.fq_name,
                expected = descriptor.label_names.len(),
                actual = label_values.len(),
                "Dropping sample with mismatched label values"
            );
            return false;
        }

        self.families
            .entry(descriptor.fq_name.clone())
            .or_insert_with(|| FamilySamples {
                descriptor: descriptor.clone(),
                samples: Vec::new(),
            })
            .samples
            .push(Sample {
                label_values,
                value,
            });
        true
    }

    /// Samples recorded for the metric with fully-qualified `name`
    pub fn samples(&self, name: &str) -> &[Sample] {
        self.families
            .get(name)
            .map(|f| f.samples.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of samples across all metrics
    pub fn len(&self) -> usize {
        self.families.values().map(|f| f.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another batch into this one
    pub fn extend(&mut self, other: MetricBatch) {
        for (name, family) in other.families {
            match self.families.get_mut(&name) {
                Some(existing) => existing.samples.extend(family.samples),
                None => {
                    self.families.insert(name, family);
                }
            }
        }
    }

    /// Render the batch as Prometheus metric families
    ///
    /// Samples sharing label values are summed into one series.
    pub fn into_families(self) -> Vec<MetricFamily> {
        let mut families = Vec::with_capacity(self.families.len());

        for (name, family) in self.families {
            let names: Vec<&str> = family
                .descriptor
                .label_names
                .iter()
                .map(String::as_str)
                .collect();
            let gauges = match GaugeVec::new(family.descriptor.opts.clone(), &names) {
                Ok(gauges) => gauges,
                Err(e) => {
                    warn!(metric = %name, error = %e, "Failed to build gauge family");
                    continue;
                }
            };

            let mut seen: HashSet<&[String]> = HashSet::with_capacity(family.samples.len());
            for sample in &family.samples {
                if !seen.insert(sample.label_values.as_slice()) {
                    warn!(
                        metric = %name,
                        labels = ?sample.label_values,
                        "Summing samples with identical label values"
                    );
                }

                let values: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
                match gauges.get_metric_with_label_values(&values) {
                    Ok(gauge) => gauge.add(sample.value),
                    Err(e) => warn!(metric = %name, error = %e, "Failed to set gauge sample"),
                }
            }

            families.extend(gauges.collect());
        }

        families
    }
}

/// Encode metric families in the Prometheus text exposition format
pub fn encode_text(families: &[MetricFamily]) -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(buffer)
}
