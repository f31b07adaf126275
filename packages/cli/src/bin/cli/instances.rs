// ABOUTME: CLI commands for tracked sandbox instances
// ABOUTME: Lists the caller's instances and applies owner status changes

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Subcommand;
use colored::*;
use devbox_cli::output::{instances_table, status_label};
use devbox_cli::Stores;
use devbox_sandbox::InstanceStatus;

use super::TeamArgs;

fn parse_status(s: &str) -> Result<InstanceStatus, String> {
    InstanceStatus::from_str(s).map_err(|e| e.to_string())
}

#[derive(Subcommand)]
pub enum InstanceCommands {
    /// List instances, newest first (stopped ones hidden by default)
    List {
        #[command(flatten)]
        team: TeamArgs,

        /// Also show instances stopped within this many hours
        #[arg(long)]
        stopped_within_hours: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Move an instance to a new status
    Status {
        #[command(flatten)]
        team: TeamArgs,

        instance_id: String,

        /// starting, running, paused, stopping, stopped, archived, error or unknown
        #[arg(value_parser = parse_status)]
        status: InstanceStatus,
    },
}

impl InstanceCommands {
    pub async fn execute(self, stores: &Stores) -> Result<()> {
        match self {
            InstanceCommands::List {
                team,
                stopped_within_hours,
                json,
            } => {
                let cutoff = stopped_within_hours.map(|hours| Utc::now() - Duration::hours(hours));
                let instances = stores.instances.list(&team.context(), cutoff).await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&instances)?);
                    return Ok(());
                }
                if instances.is_empty() {
                    println!("{}", "No instances found".yellow());
                    return Ok(());
                }

                println!("{}", instances_table(&instances));
                println!();
                println!("{} {} instances", "Total:".dimmed(), instances.len());
                Ok(())
            }
            InstanceCommands::Status {
                team,
                instance_id,
                status,
            } => {
                let instance = stores
                    .instances
                    .update_status(&team.context(), &instance_id, status)
                    .await?;
                println!(
                    "{} {} is now {}",
                    "✓".green(),
                    instance.instance_id.bold(),
                    status_label(instance.status)
                );
                Ok(())
            }
        }
    }
}
