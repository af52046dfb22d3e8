mod context;
mod ledger;
mod parser;
mod runner;
mod source;

pub use context::SqlContext;
pub use ledger::{Ledger, LedgerEntry};
pub use parser::Migration;
pub use runner::{
    ApplyReport, MigrateAction, MigrationRunner, RollbackOutcome, RunOutcome, CONTEXT_RADIUS,
};
pub use source::{list_migration_files, MigrationSource};
