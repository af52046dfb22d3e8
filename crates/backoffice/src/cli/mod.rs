mod migrate;

pub use migrate::MigrateCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Apply pending database migrations, or roll back the latest one.
#[derive(Parser)]
#[command(name = "backoffice-migrate")]
#[command(author, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI commands. Without one, pending migrations are applied.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Roll back the most recently applied migration.
    Rollback,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let cmd = match self.command {
            None => MigrateCommand::apply(),
            Some(Commands::Rollback) => MigrateCommand::rollback(),
        };
        cmd.execute().await
    }
}

/// Exit code for a command line that could not be parsed.
///
/// `--help` is not a failure; every other usage error is fatal like the rest.
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}
