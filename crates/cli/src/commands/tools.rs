//! Offline helpers: billing windows, label mappings, name folding

use anyhow::{Context, Result};
use chrono::NaiveDate;
use exporter_lib::cardinality::normalize_identifier;
use exporter_lib::window::DATE_FORMAT;
use exporter_lib::{BillingWindow, LabelMappings};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_json, print_success, print_table, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct MappingRow {
    #[tabled(rename = "Resource label")]
    resource_label: String,
    #[tabled(rename = "Prometheus label")]
    prometheus_label: String,
}

#[derive(Tabled, Serialize)]
struct NormalizedRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
}

/// Window containing `date` (YYYY-MM-DD), or the current one
pub fn parse_window(date: Option<&str>) -> Result<BillingWindow> {
    match date {
        Some(date) => {
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
            Ok(BillingWindow::containing(date))
        }
        None => Ok(BillingWindow::current()),
    }
}

pub fn show_window(date: Option<&str>, format: OutputFormat) -> Result<()> {
    let window = parse_window(date)?;

    match format {
        OutputFormat::Json => print_json(&window),
        OutputFormat::Table => {
            println!("{}", window);
            Ok(())
        }
    }
}

pub fn parse_labels(spec: &str, format: OutputFormat) -> Result<()> {
    let mappings = LabelMappings::parse(spec).context("Invalid label mapping specification")?;

    if mappings.is_empty() {
        print_warning("Specification contains no mappings");
        return Ok(());
    }

    let rows: Vec<MappingRow> = mappings
        .iter()
        .map(|m| MappingRow {
            resource_label: m.resource_label().to_string(),
            prometheus_label: m.prometheus_label().to_string(),
        })
        .collect();
    print_table(&rows, format)?;

    if matches!(format, OutputFormat::Table) {
        print_success(&format!("{} mapping(s) valid", mappings.len()));
    }
    Ok(())
}

pub fn normalize(names: &[String], format: OutputFormat) -> Result<()> {
    let rows: Vec<NormalizedRow> = names
        .iter()
        .map(|name| NormalizedRow {
            name: name.clone(),
            identifier: normalize_identifier(name),
        })
        .collect();
    print_table(&rows, format)
}
