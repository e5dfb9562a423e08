//! Cost-related CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use exporter_lib::billing::{AggregatedCostRequest, BillingClient};
use exporter_lib::cardinality::reduce_records;
use exporter_lib::{BillingWindow, CostRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::output::{format_currency, print_info, print_json, print_table, OutputFormat};

/// Billing reports amounts in US dollars
const CURRENCY: &str = "USD";

#[derive(Tabled, Serialize)]
struct ClusterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled, Serialize)]
struct WorkloadCostRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Total", display_with = "usd")]
    total: f64,
    #[tabled(rename = "Storage", display_with = "usd")]
    storage: f64,
    #[tabled(rename = "Compute", display_with = "usd")]
    compute: f64,
    #[tabled(rename = "Network", display_with = "usd")]
    network: f64,
}

fn usd(amount: &f64) -> String {
    format_currency(*amount, CURRENCY)
}

impl From<&CostRecord> for WorkloadCostRow {
    fn from(record: &CostRecord) -> Self {
        Self {
            namespace: record.namespace.clone(),
            workload: record.kind.workload_label(),
            name: record.name.clone(),
            total: record.total,
            storage: record.storage,
            compute: record.compute,
            network: record.network(),
        }
    }
}

#[derive(Serialize)]
struct CostReportOutput {
    cluster_id: String,
    window_start: String,
    window_end: String,
    cluster_total: f64,
    attributed_total: f64,
    namespaces: BTreeMap<String, f64>,
    workloads: Vec<WorkloadCostRow>,
}

/// Parameters of `costs show`
#[derive(Debug, Clone)]
pub struct CostQuery {
    pub cluster_id: String,
    pub namespace: Option<String>,
    pub group_by: String,
    pub window: BillingWindow,
    pub raw: bool,
}

/// List clusters visible to the account
pub async fn list_clusters(client: &dyn BillingClient, format: OutputFormat) -> Result<()> {
    let clusters = client.list_clusters().await.context("Failed to list clusters")?;

    let rows: Vec<ClusterRow> = clusters
        .into_iter()
        .map(|c| ClusterRow { id: c.id, name: c.name })
        .collect();
    print_table(&rows, format)
}

/// Show the cost of every workload in a cluster
pub async fn show_costs(client: &dyn BillingClient, query: &CostQuery, format: OutputFormat) -> Result<()> {
    let request = AggregatedCostRequest::new(&query.cluster_id, query.window, &query.group_by);
    let report = client
        .cluster_aggregated_cost(&request)
        .await
        .with_context(|| format!("Failed to fetch cost for cluster {}", query.cluster_id))?;

    let output = build_output(query, report.total_cost, report.records);

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Table => {
            println!("{}", "Workload Cost".bold());
            println!("{}", "=".repeat(50));
            println!("Cluster:                {}", output.cluster_id.cyan());
            println!("Window:                 {}", query.window);
            println!(
                "Cluster total:          {}",
                format_currency(output.cluster_total, CURRENCY).bold()
            );
            println!(
                "Attributed:             {}",
                format_currency(output.attributed_total, CURRENCY)
            );
            println!();

            if output.namespaces.len() > 1 {
                println!("{}", "By Namespace".bold());
                println!("{}", "-".repeat(50));
                for (namespace, total) in &output.namespaces {
                    println!("{:<24}{}", namespace, format_currency(*total, CURRENCY));
                }
                println!();
            }

            print_table(&output.workloads, format)?;

            if query.raw {
                print_info("Ephemeral workload names are shown unfolded");
            }
        }
    }

    Ok(())
}

fn build_output(query: &CostQuery, cluster_total: f64, records: Vec<CostRecord>) -> CostReportOutput {
    let mut records: Vec<CostRecord> = records
        .into_iter()
        .filter(|r| r.kind.is_workload())
        .filter(|r| query.namespace.as_ref().map_or(true, |ns| &r.namespace == ns))
        .collect();

    if !query.raw {
        records = reduce_records(records);
    }

    let mut namespaces: BTreeMap<String, f64> = BTreeMap::new();
    for record in &records {
        *namespaces.entry(record.namespace.clone()).or_insert(0.0) += record.total;
    }

    let mut workloads: Vec<WorkloadCostRow> = records.iter().map(WorkloadCostRow::from).collect();
    workloads.sort_by(|a, b| b.total.total_cmp(&a.total));

    CostReportOutput {
        cluster_id: query.cluster_id.clone(),
        window_start: query.window.start_date(),
        window_end: query.window.end_date(),
        cluster_total,
        attributed_total: namespaces.values().sum(),
        namespaces,
        workloads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_lib::ResourceKind;

    fn query(namespace: Option<&str>, raw: bool) -> CostQuery {
        CostQuery {
            cluster_id: "o-1".to_string(),
            namespace: namespace.map(str::to_string),
            group_by: "resource.label.app".to_string(),
            window: BillingWindow::containing(chrono::NaiveDate::from_ymd_opt(2024, 12, 3).unwrap()),
            raw,
        }
    }

    fn records() -> Vec<CostRecord> {
        vec![
            CostRecord::new(ResourceKind::Job, "batch", "sync-27752145", 2.0, 0.0, 2.0),
            CostRecord::new(ResourceKind::Job, "batch", "sync-27752200", 3.0, 0.0, 3.0),
            CostRecord::new(ResourceKind::Deployment, "shop", "web", 4.0, 1.0, 2.0),
            CostRecord::new(ResourceKind::Unattributed, "", "unattributed", 6.0, 6.0, 0.0),
        ]
    }

    #[test]
    fn test_output_folds_ephemeral_names() {
        let output = build_output(&query(None, false), 15.0, records());

        assert_eq!(output.workloads.len(), 2);
        assert_eq!(output.workloads[0].name, "sync");
        assert_eq!(output.workloads[0].total, 5.0);
        assert_eq!(output.attributed_total, 9.0);
        assert_eq!(output.cluster_total, 15.0);
        assert_eq!(output.window_start, "2024-12-01");
        assert_eq!(output.window_end, "2025-01-01");
    }

    #[test]
    fn test_raw_output_keeps_instances() {
        let output = build_output(&query(None, true), 15.0, records());
        assert_eq!(output.workloads.len(), 3);
    }

    #[test]
    fn test_namespace_filter() {
        let output = build_output(&query(Some("shop"), false), 15.0, records());

        assert_eq!(output.workloads.len(), 1);
        assert_eq!(output.workloads[0].network, 1.0);
        assert_eq!(output.namespaces.len(), 1);
    }
}
