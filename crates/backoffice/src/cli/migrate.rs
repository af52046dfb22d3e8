use anyhow::Result;
use console::style;
use tracing::debug;

use backoffice_core::config::MigrateConfig;
use backoffice_runtime::{
    ApplyReport, Database, MigrateAction, MigrationRunner, RollbackOutcome, RunOutcome,
};

/// One run of the migration runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrateCommand {
    pub action: MigrateAction,
}

impl MigrateCommand {
    pub fn apply() -> Self {
        Self {
            action: MigrateAction::Apply,
        }
    }

    pub fn rollback() -> Self {
        Self {
            action: MigrateAction::Rollback,
        }
    }

    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
            .init();

        // Fails before any database contact when keys are missing
        let config = MigrateConfig::from_env()?;
        debug!("Loaded configuration: {:?}", config);

        let db = Database::connect(&config.database).await?;
        let runner = MigrationRunner::new(db, config.migrations);

        println!();
        match runner.run(self.action).await? {
            RunOutcome::Applied(report) => print_apply_summary(&report),
            RunOutcome::RolledBack(outcome) => print_rollback_summary(&outcome),
        }
        println!();

        Ok(())
    }
}

fn print_apply_summary(report: &ApplyReport) {
    if report.applied.is_empty() && report.skipped.is_empty() {
        println!("  {} No migrations found", style("ℹ").blue());
        return;
    }

    for name in &report.applied {
        println!("  {} Applied: {}", style("✓").green(), style(name).cyan());
    }
    println!(
        "  {} {} applied, {} already up to date",
        style("ℹ").blue(),
        report.applied.len(),
        report.skipped.len()
    );
}

fn print_rollback_summary(outcome: &RollbackOutcome) {
    match outcome {
        RollbackOutcome::RolledBack(name) => {
            println!("  {} Rolled back: {}", style("✓").green(), style(name).cyan());
        }
        RollbackOutcome::NothingToRollback => {
            println!("  {} No migrations to rollback", style("ℹ").blue());
        }
    }
}
