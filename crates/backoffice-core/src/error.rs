use thiserror::Error;

/// Core error type for backoffice operations.
#[derive(Error, Debug)]
pub enum BackofficeError {
    #[error("Missing environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid migration {name}: {reason}")]
    Parse { name: String, reason: String },

    #[error("Migration {0} has no \"down\" section. Cannot rollback safely.")]
    UnsafeRollback(String),

    /// A migration body (or its ledger bookkeeping) failed inside its transaction.
    ///
    /// `offset` is the 1-based character position reported by Postgres, when present.
    #[error("Migration {name} failed: {message}")]
    MigrationFailed {
        name: String,
        message: String,
        offset: Option<usize>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl BackofficeError {
    pub fn parse(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using BackofficeError.
pub type Result<T> = std::result::Result<T, BackofficeError>;
