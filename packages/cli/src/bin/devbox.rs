use clap::{Parser, Subcommand};
use colored::*;
use devbox_config::Config;
use devbox_sandbox::SandboxProvider;
use std::process;

mod cli;

use cli::db::DbCommands;
use cli::environments::EnvironmentCommands;
use cli::instances::InstanceCommands;
use cli::preview::PreviewCommands;
use cli::versions::VersionCommands;

#[derive(Parser)]
#[command(name = "devbox")]
#[command(about = "Devbox operator CLI - snapshot catalogs, version history and instances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog presets for a provider
    Presets {
        #[arg(long, default_value = "morph")]
        provider: SandboxProvider,

        /// Include presets not yet offered to users
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },
    /// Resolve a snapshot ID to a catalog version
    Resolve {
        snapshot_id: String,

        #[arg(long)]
        provider: SandboxProvider,

        #[arg(long)]
        json: bool,
    },
    /// Show how a snapshot ID is structured
    Parse {
        snapshot_id: String,

        #[arg(long)]
        json: bool,
    },
    /// Manage environments
    #[command(subcommand)]
    Environments(EnvironmentCommands),
    /// Manage snapshot versions
    #[command(subcommand)]
    Versions(VersionCommands),
    /// Inspect and update tracked instances
    #[command(subcommand)]
    Instances(InstanceCommands),
    /// Look up preview codes
    #[command(subcommand)]
    Preview(PreviewCommands),
    /// Database maintenance
    #[command(subcommand)]
    Db(DbCommands),
}

#[tokio::main]
async fn main() {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = handle_command(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    devbox_cli::init_tracing(&config);

    match command {
        Commands::Presets {
            provider,
            all,
            json,
        } => cli::catalog::presets_cmd(provider, all, json),
        Commands::Resolve {
            snapshot_id,
            provider,
            json,
        } => cli::catalog::resolve_cmd(&snapshot_id, provider, json),
        Commands::Parse { snapshot_id, json } => cli::catalog::parse_cmd(&snapshot_id, json),
        Commands::Db(cmd) => cmd.execute(&config).await,
        Commands::Environments(cmd) => cmd.execute(&open_stores(&config).await?).await,
        Commands::Versions(cmd) => cmd.execute(&open_stores(&config).await?).await,
        Commands::Instances(cmd) => cmd.execute(&open_stores(&config).await?).await,
        Commands::Preview(cmd) => cmd.execute(&open_stores(&config).await?).await,
    }
}

async fn open_stores(config: &Config) -> anyhow::Result<devbox_cli::Stores> {
    tracing::debug!(path = %config.database_path.display(), "Opening database");
    let pool = devbox_cli::open_database(config).await?;
    Ok(devbox_cli::Stores::new(pool))
}
