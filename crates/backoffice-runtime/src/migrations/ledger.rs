//! The `migrations` table that records what has been applied.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool};

/// A row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: i32,
    pub name: String,
    pub run_on: Option<NaiveDateTime>,
}

/// Queries against `<schema>.migrations`.
///
/// The schema name is validated as a plain identifier by configuration before
/// it gets here.
#[derive(Debug, Clone)]
pub struct Ledger {
    schema: String,
    table: String,
}

impl Ledger {
    pub fn new(schema: impl Into<String>) -> Self {
        let schema = schema.into();
        let table = format!("{}.migrations", schema);
        Self { schema, table }
    }

    /// Fully qualified table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the schema and the table if they are missing.
    pub async fn ensure(&self, pool: &PgPool) -> sqlx::Result<()> {
        sqlx::raw_sql(&format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS {};
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                run_on TIMESTAMP DEFAULT NOW()
            );
            "#,
            self.schema, self.table
        ))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn applied_names(&self, pool: &PgPool) -> sqlx::Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM {} ORDER BY id", self.table))
                .fetch_all(pool)
                .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// The most recently applied migration, ties on `run_on` broken by id.
    pub async fn latest(&self, pool: &PgPool) -> sqlx::Result<Option<LedgerEntry>> {
        let row: Option<(i32, String, Option<NaiveDateTime>)> = sqlx::query_as(&format!(
            "SELECT id, name, run_on FROM {} ORDER BY run_on DESC NULLS LAST, id DESC LIMIT 1",
            self.table
        ))
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id, name, run_on)| LedgerEntry { id, name, run_on }))
    }

    pub async fn contains(&self, conn: &mut PgConnection, name: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE name = $1)",
            self.table
        ))
        .bind(name)
        .fetch_one(conn)
        .await
    }

    pub async fn record(&self, conn: &mut PgConnection, name: &str) -> sqlx::Result<()> {
        sqlx::query(&format!("INSERT INTO {} (name) VALUES ($1)", self.table))
            .bind(name)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete the entry for `name`, returning how many rows went away.
    pub async fn remove(&self, conn: &mut PgConnection, name: &str) -> sqlx::Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE name = $1", self.table))
            .bind(name)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}
