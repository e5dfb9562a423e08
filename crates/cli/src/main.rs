//! Cost exporter CLI
//!
//! Inspect what the exporter would export: workload cost per cluster,
//! right-sizing suggestions, billing windows and label mappings.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{costs, suggestions, tools};
use exporter_lib::billing::{OceanClient, OceanClientConfig, DEFAULT_GROUP_BY};
use std::time::Duration;

/// Cost exporter CLI
#[derive(Parser)]
#[command(name = "costctl")]
#[command(author, version, about = "CLI for the Kubernetes cost exporter", long_about = None)]
pub struct Cli {
    /// Billing API endpoint
    #[arg(long, env = "EXPORTER_API_ENDPOINT", default_value = "https://api.spotinst.io")]
    pub api_url: String,

    /// Billing API token
    #[arg(long, env = "EXPORTER_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Billing account id
    #[arg(long, env = "EXPORTER_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List clusters visible to the account
    Clusters,

    /// View workload cost
    #[command(subcommand)]
    Costs(CostsCommands),

    /// View right-sizing suggestions
    #[command(subcommand)]
    Suggestions(SuggestionsCommands),

    /// Show the billing window containing a date
    Window {
        /// Date as YYYY-MM-DD (today if not specified)
        #[arg(long)]
        date: Option<String>,
    },

    /// Label mapping tools
    #[command(subcommand)]
    Labels(LabelsCommands),

    /// Show how workload names are folded into stable identifiers
    Normalize {
        /// Workload names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CostsCommands {
    /// Show the cost of every workload in a cluster
    Show {
        /// Cluster id
        cluster: String,

        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Billing grouping key
        #[arg(long, default_value = DEFAULT_GROUP_BY)]
        group_by: String,

        /// Any date inside the billing month (current month if not specified)
        #[arg(long)]
        date: Option<String>,

        /// Show workload instances without folding ephemeral names
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand)]
pub enum SuggestionsCommands {
    /// Show right-sizing suggestions for a cluster
    Show {
        /// Cluster id
        cluster: String,

        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Include per-container suggestions
        #[arg(long)]
        containers: bool,
    },
}

#[derive(Subcommand)]
pub enum LabelsCommands {
    /// Parse and validate a label mapping specification
    Parse {
        /// Specification such as "team,app.kubernetes.io/name=app"
        spec: String,
    },
}

impl Cli {
    fn billing_client(&self) -> Result<OceanClient> {
        OceanClient::new(OceanClientConfig {
            endpoint: self.api_url.clone(),
            token: self.token.clone(),
            account_id: self.account_id.clone(),
            request_timeout: Duration::from_secs(self.timeout),
        })
        .context("Failed to create billing client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Clusters => {
            let client = cli.billing_client()?;
            costs::list_clusters(&client, cli.format).await?;
        }
        Commands::Costs(CostsCommands::Show {
            cluster,
            namespace,
            group_by,
            date,
            raw,
        }) => {
            let client = cli.billing_client()?;
            let window = tools::parse_window(date.as_deref())?;
            let query = costs::CostQuery {
                cluster_id: cluster.clone(),
                namespace: namespace.clone(),
                group_by: group_by.clone(),
                window,
                raw: *raw,
            };
            costs::show_costs(&client, &query, cli.format).await?;
        }
        Commands::Suggestions(SuggestionsCommands::Show {
            cluster,
            namespace,
            containers,
        }) => {
            let client = cli.billing_client()?;
            suggestions::show_suggestions(&client, cluster, namespace.as_deref(), *containers, cli.format)
                .await?;
        }
        Commands::Window { date } => {
            tools::show_window(date.as_deref(), cli.format)?;
        }
        Commands::Labels(LabelsCommands::Parse { spec }) => {
            tools::parse_labels(spec, cli.format)?;
        }
        Commands::Normalize { names } => {
            tools::normalize(names, cli.format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_costs_show_defaults() {
        let cli = Cli::try_parse_from(["costctl", "costs", "show", "o-123"]).unwrap();

        assert_eq!(cli.api_url, "https://api.spotinst.io");
        assert_eq!(cli.timeout, 30);
        match cli.command {
            Commands::Costs(CostsCommands::Show {
                cluster,
                namespace,
                group_by,
                date,
                raw,
            }) => {
                assert_eq!(cluster, "o-123");
                assert!(namespace.is_none());
                assert_eq!(group_by, DEFAULT_GROUP_BY);
                assert!(date.is_none());
                assert!(!raw);
            }
            _ => panic!("expected costs show"),
        }
    }

    #[test]
    fn test_suggestions_show_flags() {
        let cli = Cli::try_parse_from([
            "costctl",
            "--format",
            "json",
            "suggestions",
            "show",
            "o-1",
            "-n",
            "shop",
            "--containers",
        ])
        .unwrap();

        assert!(matches!(cli.format, output::OutputFormat::Json));
        match cli.command {
            Commands::Suggestions(SuggestionsCommands::Show {
                cluster,
                namespace,
                containers,
            }) => {
                assert_eq!(cluster, "o-1");
                assert_eq!(namespace.as_deref(), Some("shop"));
                assert!(containers);
            }
            _ => panic!("expected suggestions show"),
        }
    }

    #[test]
    fn test_normalize_requires_names() {
        assert!(Cli::try_parse_from(["costctl", "normalize"]).is_err());
        assert!(Cli::try_parse_from(["costctl", "normalize", "job-27752145"]).is_ok());
    }

    #[test]
    fn test_costs_show_requires_cluster() {
        assert!(Cli::try_parse_from(["costctl", "costs", "show"]).is_err());
    }
}
