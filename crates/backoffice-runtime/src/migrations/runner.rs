//! Linear migration runner.
//!
//! Applies pending files one at a time, each in its own transaction together
//! with its ledger insert, or reverts the single most recent one.

use std::collections::HashSet;
use std::path::PathBuf;

use sqlx::postgres::{PgDatabaseError, PgErrorPosition};
use tracing::{debug, error, info};

use backoffice_core::config::MigrationsConfig;
use backoffice_core::error::{BackofficeError, Result};

use super::context::SqlContext;
use super::ledger::Ledger;
use super::parser::Migration;
use super::source::{list_migration_files, MigrationSource};
use crate::db::Database;

/// Characters of SQL shown either side of a reported error position.
pub const CONTEXT_RADIUS: usize = 40;

/// What a single run of the runner should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrateAction {
    /// Apply every pending migration.
    #[default]
    Apply,
    /// Revert the most recently applied migration.
    Rollback,
}

/// Migrations touched by `apply`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Newly applied, in order.
    pub applied: Vec<String>,
    /// Found in the ledger and left alone.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBack(String),
    NothingToRollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Applied(ApplyReport),
    RolledBack(RollbackOutcome),
}

/// Migration runner bound to one database and one migrations directory.
pub struct MigrationRunner {
    db: Database,
    dir: PathBuf,
    ledger: Ledger,
}

impl MigrationRunner {
    pub fn new(db: Database, config: MigrationsConfig) -> Self {
        Self {
            db,
            dir: config.dir,
            ledger: Ledger::new(config.schema),
        }
    }

    /// Perform `action` and close the database.
    ///
    /// The runner is consumed: the connection pool is closed exactly once,
    /// whether the action succeeded, had nothing to do, or failed.
    pub async fn run(self, action: MigrateAction) -> Result<RunOutcome> {
        let result = match action {
            MigrateAction::Apply => self.apply().await.map(RunOutcome::Applied),
            MigrateAction::Rollback => self.rollback().await.map(RunOutcome::RolledBack),
        };

        // Always close, even on error
        self.db.close().await;

        result
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure_ledger(&self) -> Result<()> {
        self.ledger.ensure(self.db.pool()).await.map_err(|e| {
            BackofficeError::Database(format!(
                "Failed to create {}: {}",
                self.ledger.table(),
                e
            ))
        })?;
        info!("Table {} ensured", self.ledger.table());
        Ok(())
    }

    /// Files on disk that are not in the ledger, in apply order.
    pub async fn list_pending(&self) -> Result<Vec<MigrationSource>> {
        self.ensure_ledger().await?;
        let (files, applied) = self.scan().await?;
        Ok(files
            .into_iter()
            .filter(|f| !applied.contains(&f.name))
            .collect())
    }

    /// Apply every pending migration, stopping at the first failure.
    pub async fn apply(&self) -> Result<ApplyReport> {
        self.ensure_ledger().await?;
        let (files, applied) = self.scan().await?;

        let mut report = ApplyReport::default();

        if files.is_empty() {
            info!("No migration files found in {}", self.dir.display());
            return Ok(report);
        }

        for file in files {
            if applied.contains(&file.name) {
                info!("Already applied: {}", file.name);
                report.skipped.push(file.name);
                continue;
            }

            let migration = file.load()?;

            info!("Applying migration: {}", migration.name);
            if self.apply_one(&migration).await? {
                info!("Migration applied: {}", migration.name);
                report.applied.push(migration.name);
            } else {
                info!("Already applied: {}", migration.name);
                report.skipped.push(migration.name);
            }
        }

        Ok(report)
    }

    /// Revert the most recently applied migration.
    pub async fn rollback(&self) -> Result<RollbackOutcome> {
        self.ensure_ledger().await?;

        let last = self.ledger.latest(self.db.pool()).await.map_err(|e| {
            BackofficeError::Database(format!("Failed to read last migration: {}", e))
        })?;

        let Some(last) = last else {
            info!("No migrations to rollback");
            return Ok(RollbackOutcome::NothingToRollback);
        };

        let migration = MigrationSource::at(&self.dir, &last.name).load()?;

        let Some(down_sql) = migration.down_sql.as_deref() else {
            error!(
                "Migration {} has no \"down\" section. Cannot rollback safely.",
                migration.name
            );
            return Err(BackofficeError::UnsafeRollback(migration.name));
        };

        info!("Rolling back migration: {}", migration.name);
        self.revert_one(&migration.name, down_sql).await?;
        info!("Migration rolled back: {}", migration.name);

        Ok(RollbackOutcome::RolledBack(migration.name))
    }

    async fn scan(&self) -> Result<(Vec<MigrationSource>, HashSet<String>)> {
        let applied = self.ledger.applied_names(self.db.pool()).await.map_err(|e| {
            BackofficeError::Database(format!("Failed to get applied migrations: {}", e))
        })?;
        debug!("Already applied migrations: {:?}", applied);

        let files = list_migration_files(&self.dir)?;
        Ok((files, applied))
    }

    /// Run the up body and the ledger insert in one transaction.
    ///
    /// Returns `false` if another writer recorded the migration first.
    async fn apply_one(&self, migration: &Migration) -> Result<bool> {
        let name = &migration.name;
        let sql = &migration.up_sql;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        let recorded = self
            .ledger
            .contains(&mut tx, name)
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;
        if recorded {
            tx.rollback()
                .await
                .map_err(|e| bookkeeping_failure(name, e))?;
            return Ok(false);
        }

        if let Err(e) = sqlx::raw_sql(sql).execute(&mut *tx).await {
            return Err(body_failure(name, sql, e));
        }

        self.ledger
            .record(&mut tx, name)
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        tx.commit()
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        Ok(true)
    }

    /// Run the down body and the ledger delete in one transaction.
    async fn revert_one(&self, name: &str, sql: &str) -> Result<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        if let Err(e) = sqlx::raw_sql(sql).execute(&mut *tx).await {
            return Err(body_failure(name, sql, e));
        }

        let removed = self
            .ledger
            .remove(&mut tx, name)
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        // Dropping the transaction undoes the down body.
        if removed != 1 {
            error!("Failed on {}", name);
            error!("Expected to remove 1 ledger entry, removed {}", removed);
            return Err(BackofficeError::MigrationFailed {
                name: name.to_string(),
                message: format!(
                    "expected to remove 1 entry from {}, removed {}",
                    self.ledger.table(),
                    removed
                ),
                offset: None,
            });
        }

        tx.commit()
            .await
            .map_err(|e| bookkeeping_failure(name, e))?;

        Ok(())
    }
}

/// The migration body itself failed; positions refer to `sql`.
fn body_failure(name: &str, sql: &str, err: sqlx::Error) -> BackofficeError {
    let offset = error_position(&err);

    error!("Failed on {}", name);
    error!("{}", err);
    if let Some(position) = offset {
        error!("\n{}", SqlContext::locate(sql, position, CONTEXT_RADIUS));
    }

    BackofficeError::MigrationFailed {
        name: name.to_string(),
        message: err.to_string(),
        offset,
    }
}

/// Transaction control or ledger statements failed; no SQL context applies.
fn bookkeeping_failure(name: &str, err: sqlx::Error) -> BackofficeError {
    error!("Failed on {}", name);
    error!("{}", err);

    BackofficeError::MigrationFailed {
        name: name.to_string(),
        message: err.to_string(),
        offset: None,
    }
}

/// 1-based character position Postgres attached to the error, if any.
fn error_position(err: &sqlx::Error) -> Option<usize> {
    let pg = err
        .as_database_error()?
        .try_downcast_ref::<PgDatabaseError>()?;

    match pg.position()? {
        PgErrorPosition::Original(position) => Some(position),
        PgErrorPosition::Internal { .. } => None,
    }
}
