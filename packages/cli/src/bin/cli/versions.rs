// ABOUTME: CLI commands for an environment's snapshot version history
// ABOUTME: Create, activate, remove and list versions through the version store

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use devbox_cli::Stores;
use devbox_sandbox::{CreateSnapshotVersion, SandboxProvider};

use super::TeamArgs;

#[derive(Subcommand)]
pub enum VersionCommands {
    /// List versions, newest first
    List {
        #[command(flatten)]
        team: TeamArgs,

        /// Environment ID
        environment_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a new snapshot version
    Create {
        #[command(flatten)]
        team: TeamArgs,

        /// Environment ID
        environment_id: String,

        /// Snapshot ID to record
        #[arg(long)]
        snapshot: String,

        #[arg(long, default_value = "morph")]
        provider: SandboxProvider,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        template_vmid: Option<u32>,

        #[arg(long)]
        maintenance_script: Option<String>,

        #[arg(long)]
        dev_script: Option<String>,

        /// Stage the version without pointing the environment at it
        #[arg(long)]
        no_activate: bool,
    },

    /// Point the environment at an existing version
    Activate {
        #[command(flatten)]
        team: TeamArgs,

        environment_id: String,

        version_id: String,
    },

    /// Delete a version (the active version cannot be removed)
    Remove {
        #[command(flatten)]
        team: TeamArgs,

        environment_id: String,

        version_id: String,
    },
}

impl VersionCommands {
    pub async fn execute(self, stores: &Stores) -> Result<()> {
        match self {
            VersionCommands::List {
                team,
                environment_id,
                json,
            } => {
                let versions = stores
                    .versions
                    .list(&team.context(), &environment_id)
                    .await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&versions)?);
                    return Ok(());
                }
                if versions.is_empty() {
                    println!("{}", "No snapshot versions recorded".yellow());
                    return Ok(());
                }

                println!("{}", devbox_cli::output::versions_table(&versions));
                println!();
                println!("{} {} versions", "Total:".dimmed(), versions.len());
                Ok(())
            }
            VersionCommands::Create {
                team,
                environment_id,
                snapshot,
                provider,
                label,
                template_vmid,
                maintenance_script,
                dev_script,
                no_activate,
            } => {
                let mut input = CreateSnapshotVersion::new(snapshot, provider);
                input.label = label;
                input.template_vmid = template_vmid;
                input.maintenance_script = maintenance_script;
                input.dev_script = dev_script;
                input.activate = !no_activate;

                let version = stores
                    .versions
                    .create(&team.context(), &environment_id, input)
                    .await?;

                println!(
                    "{} Created v{} ({}) {}",
                    "✓".green(),
                    version.version,
                    version.snapshot_id.bold(),
                    version.id.dimmed()
                );
                if no_activate {
                    println!(
                        "  Staged; activate with: {}",
                        activate_hint(&team, &environment_id, &version.id)
                    );
                }
                Ok(())
            }
            VersionCommands::Activate {
                team,
                environment_id,
                version_id,
            } => {
                let version = stores
                    .versions
                    .activate(&team.context(), &environment_id, &version_id)
                    .await?;
                println!(
                    "{} Environment {} now runs v{} ({})",
                    "✓".green(),
                    environment_id,
                    version.version,
                    version.snapshot_id.bold()
                );
                Ok(())
            }
            VersionCommands::Remove {
                team,
                environment_id,
                version_id,
            } => {
                stores
                    .versions
                    .remove(&team.context(), &environment_id, &version_id)
                    .await?;
                println!("{} Removed version {}", "✓".green(), version_id);
                Ok(())
            }
        }
    }
}

fn activate_hint(team: &TeamArgs, environment_id: &str, version_id: &str) -> String {
    format!(
        "devbox versions activate --team {} --user {} {} {}",
        team.team, team.user, environment_id, version_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct Devbox {
        #[command(subcommand)]
        command: Top,
    }

    #[derive(clap::Subcommand)]
    enum Top {
        #[command(subcommand)]
        Versions(VersionCommands),
    }

    #[test]
    fn test_activate_hint_parses_as_a_command() {
        let team = TeamArgs {
            team: "team_1".to_string(),
            user: "user_1".to_string(),
        };
        let hint = activate_hint(&team, "env_1", "ver_2");

        let parsed = Devbox::try_parse_from(hint.split_whitespace()).unwrap();
        let Top::Versions(VersionCommands::Activate {
            team,
            environment_id,
            version_id,
        }) = parsed.command
        else {
            panic!("expected versions activate");
        };
        assert_eq!(team.team, "team_1");
        assert_eq!(team.user, "user_1");
        assert_eq!(environment_id, "env_1");
        assert_eq!(version_id, "ver_2");
    }
}
