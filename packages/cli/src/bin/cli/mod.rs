pub mod catalog;
pub mod db;
pub mod environments;
pub mod instances;
pub mod preview;
pub mod versions;

use clap::Args;
use devbox_sandbox::TeamContext;

/// Identity the command acts as. Authentication happens elsewhere; the CLI
/// just forwards what the operator passes.
#[derive(Args, Debug, Clone)]
pub struct TeamArgs {
    /// Team ID to act as
    #[arg(long)]
    pub team: String,

    /// User ID to act as
    #[arg(long)]
    pub user: String,
}

impl TeamArgs {
    pub fn context(&self) -> TeamContext {
        TeamContext::new(self.team.clone(), self.user.clone())
    }
}
