//! Explicit database provisioning for tests.
//!
//! Database configuration is EXPLICIT - either pass a URL to `from_url()` or
//! opt in through `TEST_DATABASE_URL` with `from_env()`. The runtime
//! `DB_*` variables are NEVER read here.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::{BackofficeError, Result};

/// Name of the variable that opts a test run into database tests.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// Explicit database access for tests.
pub struct TestDatabase {
    pool: PgPool,
    url: String,
}

impl TestDatabase {
    /// Connect to database at the given URL.
    pub async fn from_url(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(BackofficeError::Sql)?;

        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    /// Connect using the TEST_DATABASE_URL environment variable.
    ///
    /// Returns `Ok(None)` when the variable is unset so callers can skip.
    pub async fn from_env() -> Result<Option<Self>> {
        match std::env::var(TEST_DATABASE_URL) {
            Ok(url) if !url.is_empty() => Self::from_url(&url).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the database URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run raw SQL to set up test data or schema.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(BackofficeError::Sql)?;
        Ok(())
    }

    /// Reserve a fresh schema name for a single test.
    ///
    /// The schema itself is not created; code under test is expected to do
    /// that. `cleanup()` drops it along with everything inside.
    pub fn isolated_schema(&self, test_name: &str) -> IsolatedSchema {
        // UUID suffix prevents collisions when tests run in parallel
        let name = format!(
            "bo_test_{}_{}",
            sanitize_identifier(test_name),
            uuid::Uuid::new_v4().simple()
        );

        IsolatedSchema {
            pool: self.pool.clone(),
            name,
        }
    }
}

/// A schema that exists for the lifetime of a single test.
pub struct IsolatedSchema {
    pool: PgPool,
    name: String,
}

impl IsolatedSchema {
    /// Get the schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `table` exists inside this schema.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&self.name)
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(BackofficeError::Sql)?;
        Ok(exists)
    }

    /// Drop the schema and everything in it.
    pub async fn cleanup(self) -> Result<()> {
        sqlx::raw_sql(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.name))
            .execute(&self.pool)
            .await
            .map_err(BackofficeError::Sql)?;
        Ok(())
    }
}

/// Sanitize a test name for use in an unquoted identifier.
fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(24)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("apply_twice"), "apply_twice");
        assert_eq!(sanitize_identifier("Rollback-Latest"), "rollback_latest");
        assert_eq!(sanitize_identifier("test::function"), "test__function");
        assert_eq!(sanitize_identifier(&"x".repeat(40)).len(), 24);
    }
}
