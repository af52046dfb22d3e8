pub mod db;
pub mod migrations;

pub use db::Database;
pub use migrations::{
    ApplyReport, LedgerEntry, MigrateAction, Migration, MigrationRunner, MigrationSource,
    RollbackOutcome, RunOutcome, SqlContext,
};
