use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::debug;

use backoffice_core::config::DatabaseConfig;
use backoffice_core::error::{BackofficeError, Result};

/// Database connection wrapper around the migration user's pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::pool_options(config)
            .connect_with(Self::connect_options(config))
            .await
            .map_err(|e| {
                BackofficeError::Database(format!(
                    "Failed to connect to {}:{}/{}: {}",
                    config.host, config.port, config.name, e
                ))
            })?;

        debug!(
            "Connected to {}:{}/{} as {}",
            config.host, config.port, config.name, config.user
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
        let ssl_mode = if config.tls_enabled {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode)
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_pool_size.max(1))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .max_lifetime(Some(Duration::from_secs(config.max_lifetime_secs)))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
    }

    /// Get the pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database connections closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tls_enabled: bool) -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            name: "backoffice".to_string(),
            user: "migrator".to_string(),
            password: "secret".to_string(),
            max_pool_size: 0,
            idle_timeout_secs: 30,
            max_lifetime_secs: 600,
            connect_timeout_secs: 7,
            tls_enabled,
        }
    }

    #[test]
    fn test_connect_options_follow_config() {
        let opts = Database::connect_options(&config(false));
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_database(), Some("backoffice"));
        assert_eq!(opts.get_username(), "migrator");
        assert!(matches!(opts.get_ssl_mode(), PgSslMode::Disable));

        let opts = Database::connect_options(&config(true));
        assert!(matches!(opts.get_ssl_mode(), PgSslMode::Require));
    }

    #[test]
    fn test_pool_options_follow_config() {
        let opts = Database::pool_options(&config(false));
        // A zero pool size would make every acquire time out.
        assert_eq!(opts.get_max_connections(), 1);
        assert_eq!(opts.get_idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(opts.get_max_lifetime(), Some(Duration::from_secs(600)));
        assert_eq!(opts.get_acquire_timeout(), Duration::from_secs(7));
    }
}
