pub mod config;
pub mod error;
#[cfg(feature = "testing")]
pub mod testing;

pub use config::{DatabaseConfig, MigrateConfig, MigrationsConfig};
pub use error::{BackofficeError, Result};
