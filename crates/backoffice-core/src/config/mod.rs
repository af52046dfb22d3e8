mod database;

pub use database::DatabaseConfig;

use std::path::PathBuf;

use crate::error::{BackofficeError, Result};

/// Keys that must be present before the migration runner touches the database.
pub const REQUIRED_ENV: [&str; 9] = [
    "DB_MAX_POOL_CON",
    "DB_IDLE_TIMEOUT",
    "DB_MAX_CON_LIFETIME",
    "DB_CON_TIMEOUT",
    "DB_MIGRATION_USER",
    "DB_MIGRATION_PASSWORD",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
];

/// Root configuration for the migration runner.
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Connection parameters for the migration user.
    pub database: DatabaseConfig,

    /// Where migrations live and where the ledger is kept.
    pub migrations: MigrationsConfig,
}

impl MigrateConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Every required key is checked before anything is parsed, so a single
    /// error lists all of the missing ones. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_ENV
            .into_iter()
            .filter(|&key| get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BackofficeError::MissingEnv(missing));
        }

        let required = |key: &str| get(key).unwrap_or_default();

        let database = DatabaseConfig {
            host: required("DB_HOST"),
            port: parse_number("DB_PORT", &required("DB_PORT"))?,
            name: required("DB_NAME"),
            user: required("DB_MIGRATION_USER"),
            password: required("DB_MIGRATION_PASSWORD"),
            max_pool_size: parse_number("DB_MAX_POOL_CON", &required("DB_MAX_POOL_CON"))?,
            idle_timeout_secs: parse_number("DB_IDLE_TIMEOUT", &required("DB_IDLE_TIMEOUT"))?,
            max_lifetime_secs: parse_number(
                "DB_MAX_CON_LIFETIME",
                &required("DB_MAX_CON_LIFETIME"),
            )?,
            connect_timeout_secs: parse_number("DB_CON_TIMEOUT", &required("DB_CON_TIMEOUT"))?,
            tls_enabled: lookup("DATABASE_TLS_ENABLED").as_deref() == Some("true"),
        };

        let mut migrations = MigrationsConfig::default();
        if let Some(dir) = get("MIGRATIONS_DIR") {
            migrations.dir = PathBuf::from(dir);
        }
        if let Some(schema) = get("DB_MIGRATIONS_SCHEMA") {
            migrations.schema = schema;
        }
        migrations.validate()?;

        Ok(Self {
            database,
            migrations,
        })
    }
}

/// Migration source and ledger location.
#[derive(Debug, Clone)]
pub struct MigrationsConfig {
    /// Directory scanned for `*.sql` migration files.
    pub dir: PathBuf,

    /// Schema that holds the `migrations` ledger table.
    pub schema: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            schema: default_ledger_schema(),
        }
    }
}

impl MigrationsConfig {
    /// The schema name is interpolated into DDL, so it must be a plain identifier.
    pub fn validate(&self) -> Result<()> {
        let mut chars = self.schema.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };
        if !valid {
            return Err(BackofficeError::Config(format!(
                "DB_MIGRATIONS_SCHEMA must be a plain identifier, got '{}'",
                self.schema
            )));
        }
        Ok(())
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("./db/migrations")
}

fn default_ledger_schema() -> String {
    "backoffice_data".to_string()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BackofficeError::Config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
