use anyhow::Result;
use clap::Subcommand;
use colored::*;
use devbox_config::Config;

#[derive(Subcommand)]
pub enum DbCommands {
    /// Create the database if needed and apply pending migrations
    Migrate,
}

impl DbCommands {
    pub async fn execute(self, config: &Config) -> Result<()> {
        match self {
            DbCommands::Migrate => {
                let pool = devbox_cli::open_database(config).await?;
                pool.close().await;
                println!(
                    "{} Database up to date at {}",
                    "✓".green(),
                    config.database_path.display()
                );
                Ok(())
            }
        }
    }
}
