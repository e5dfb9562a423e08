//! Right-sizing CLI commands

use anyhow::{Context, Result};
use colored::Colorize;
use exporter_lib::billing::SuggestionsClient;
use exporter_lib::ResourceSuggestion;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_quantity, format_suggestion, print_json, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct SuggestionRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "CPU Req")]
    cpu_requested: String,
    #[tabled(rename = "CPU Sugg")]
    cpu_suggested: String,
    #[tabled(rename = "Mem Req")]
    memory_requested: String,
    #[tabled(rename = "Mem Sugg")]
    memory_suggested: String,
}

/// Flatten suggestions into rows, workload first, then its containers
fn rows(suggestions: &[ResourceSuggestion], containers: bool) -> Vec<SuggestionRow> {
    let mut rows = Vec::new();

    for s in suggestions {
        rows.push(SuggestionRow {
            namespace: s.namespace.clone(),
            workload: s.kind.workload_label(),
            name: s.name.clone(),
            container: "-".to_string(),
            cpu_requested: format_quantity(s.requested_cpu),
            cpu_suggested: format_suggestion(s.requested_cpu, s.suggested_cpu),
            memory_requested: format_quantity(s.requested_memory),
            memory_suggested: format_suggestion(s.requested_memory, s.suggested_memory),
        });

        if containers {
            for c in &s.containers {
                rows.push(SuggestionRow {
                    namespace: s.namespace.clone(),
                    workload: s.kind.workload_label(),
                    name: s.name.clone(),
                    container: c.name.clone(),
                    cpu_requested: format_quantity(c.requested_cpu),
                    cpu_suggested: format_suggestion(c.requested_cpu, c.suggested_cpu),
                    memory_requested: format_quantity(c.requested_memory),
                    memory_suggested: format_suggestion(c.requested_memory, c.suggested_memory),
                });
            }
        }
    }

    rows
}

/// Show right-sizing suggestions for a cluster
pub async fn show_suggestions(
    client: &dyn SuggestionsClient,
    cluster_id: &str,
    namespace: Option<&str>,
    containers: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut suggestions = client
        .list_resource_suggestions(cluster_id)
        .await
        .with_context(|| format!("Failed to fetch suggestions for cluster {}", cluster_id))?;

    if let Some(ns) = namespace {
        suggestions.retain(|s| s.namespace == ns);
    }

    match format {
        // Raw values, so scripts see numbers rather than colored strings
        OutputFormat::Json => print_json(&suggestions),
        OutputFormat::Table => {
            println!("{} {}", "Right-sizing suggestions for".bold(), cluster_id.cyan());
            print_table(&rows(&suggestions, containers), format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exporter_lib::{ContainerSuggestion, ResourceKind};

    fn suggestion() -> ResourceSuggestion {
        ResourceSuggestion {
            kind: ResourceKind::StatefulSet,
            namespace: "db".to_string(),
            name: "postgres".to_string(),
            requested_cpu: 2000.0,
            suggested_cpu: 2000.0,
            requested_memory: 4096.0,
            suggested_memory: 4096.0,
            containers: vec![ContainerSuggestion {
                name: "postgres".to_string(),
                requested_cpu: 1500.0,
                suggested_cpu: 1500.0,
                requested_memory: 0.5,
                suggested_memory: 0.5,
            }],
        }
    }

    #[test]
    fn test_rows_without_containers() {
        let rows = rows(&[suggestion()], false);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].workload, "statefulset");
        assert_eq!(rows[0].container, "-");
        assert_eq!(rows[0].cpu_suggested, "2000");
    }

    #[test]
    fn test_rows_with_containers() {
        let rows = rows(&[suggestion()], true);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].container, "postgres");
        assert_eq!(rows[1].memory_requested, "0.50");
    }
}
