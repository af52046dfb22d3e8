use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use backoffice_core::error::Result;

use super::parser::Migration;

/// A migration file on disk, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    /// File name, which doubles as the ledger name.
    pub name: String,
    pub path: PathBuf,
}

impl MigrationSource {
    /// The file called `name` inside `dir`.
    pub fn at(dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: dir.join(name),
        }
    }

    /// Read and parse the file.
    pub fn load(&self) -> Result<Migration> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", self.path.display(), e))
        })?;
        Migration::parse(&self.name, &content)
    }
}

/// List `*.sql` files in `dir`, sorted by file name.
///
/// Sorting is byte-wise on the name, so `0002_x.sql` comes before
/// `0010_y.sql` only when prefixes are zero-padded.
pub fn list_migration_files(dir: &Path) -> Result<Vec<MigrationSource>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("migrations directory {}: {}", dir.display(), e),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        if !path.extension().map(|e| e == "sql").unwrap_or(false) || !path.is_file() {
            continue;
        }

        match path.file_name().and_then(|s| s.to_str()) {
            Some(name) => files.push(MigrationSource {
                name: name.to_string(),
                path: path.clone(),
            }),
            None => warn!("Skipping migration with non UTF-8 name: {:?}", path),
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));

    debug!("Found {} migration files in {}", files.len(), dir.display());
    Ok(files)
}
