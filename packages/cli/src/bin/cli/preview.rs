use anyhow::Result;
use clap::Subcommand;
use colored::*;
use devbox_cli::Stores;

#[derive(Subcommand)]
pub enum PreviewCommands {
    /// Show where a preview code routes to
    Lookup {
        code: String,

        /// Print the upstream token as well
        #[arg(long)]
        show_token: bool,
    },
}

impl PreviewCommands {
    pub async fn execute(self, stores: &Stores) -> Result<()> {
        match self {
            PreviewCommands::Lookup { code, show_token } => {
                let Some(route) = stores.previews.get_by_code(&code).await? else {
                    anyhow::bail!("Preview code {} not found", code);
                };

                println!("{} {}", code.bold(), "→".dimmed());
                println!("  Sandbox: {}", route.provider_sandbox_id);
                println!("  Port:    {}", route.port);
                println!("  Target:  {}", route.target_url);
                if show_token {
                    println!("  Token:   {}", route.token);
                }
                Ok(())
            }
        }
    }
}
