mod run;

pub use run::RunCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Tether - worker-service runtime
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run a service until interrupted.
    Run(RunCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
        }
    }
}
