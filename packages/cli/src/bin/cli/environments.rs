use anyhow::Result;
use clap::Subcommand;
use colored::*;
use devbox_cli::Stores;
use devbox_sandbox::{CreateEnvironment, SandboxProvider};

use super::TeamArgs;

#[derive(Subcommand)]
pub enum EnvironmentCommands {
    /// Create an environment pointing at an initial snapshot
    Create {
        #[command(flatten)]
        team: TeamArgs,

        /// Environment name
        name: String,

        /// Initial snapshot ID
        #[arg(long)]
        snapshot: String,

        /// Provider the snapshot belongs to
        #[arg(long, default_value = "morph")]
        provider: SandboxProvider,
    },

    /// Show an environment and its active snapshot
    Show {
        #[command(flatten)]
        team: TeamArgs,

        environment_id: String,

        #[arg(long)]
        json: bool,
    },
}

impl EnvironmentCommands {
    pub async fn execute(self, stores: &Stores) -> Result<()> {
        match self {
            EnvironmentCommands::Create {
                team,
                name,
                snapshot,
                provider,
            } => {
                let environment = stores
                    .environments
                    .create(
                        &team.context(),
                        CreateEnvironment {
                            name,
                            snapshot_id: snapshot,
                            snapshot_provider: provider,
                            template_vmid: None,
                            maintenance_script: None,
                            dev_script: None,
                        },
                    )
                    .await?;
                println!(
                    "{} Created environment {} ({})",
                    "✓".green(),
                    environment.id.bold(),
                    environment.name
                );
                Ok(())
            }
            EnvironmentCommands::Show {
                team,
                environment_id,
                json,
            } => {
                let environment = stores
                    .environments
                    .get(&team.context(), &environment_id)
                    .await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&environment)?);
                    return Ok(());
                }

                println!("{} {}", environment.name.bold(), environment.id.dimmed());
                println!(
                    "  Active snapshot: {} ({})",
                    environment.snapshot_id, environment.snapshot_provider
                );
                if let Some(script) = &environment.maintenance_script {
                    println!("  Maintenance:     {}", script);
                }
                if let Some(script) = &environment.dev_script {
                    println!("  Dev:             {}", script);
                }
                println!(
                    "  Updated:         {}",
                    devbox_cli::output::format_time(environment.updated_at)
                );
                Ok(())
            }
        }
    }
}
