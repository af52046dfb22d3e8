//! Two-section migration file format.
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE t ();
//! -- migrate:down
//! DROP TABLE t;
//! ```
//!
//! Marker lines are case-insensitive and must stand on their own line.

use backoffice_core::error::{BackofficeError, Result};

const UP_MARKER: &str = "migrate:up";
const DOWN_MARKER: &str = "migrate:down";

/// A parsed migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// File name, including the `.sql` extension (e.g. "0001_init.sql").
    pub name: String,
    /// SQL executed on apply. Never empty.
    pub up_sql: String,
    /// SQL executed on rollback. `None` makes the migration rollback-unsafe.
    pub down_sql: Option<String>,
}

impl Migration {
    /// Parse the contents of a migration file.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();

        let mut up_body_start = None;
        let mut down_marker = None;

        for (start, line) in lines_with_offsets(content) {
            let end = start + line.len();
            match up_body_start {
                None if is_marker(line, UP_MARKER) => up_body_start = Some(end),
                None => {}
                Some(_) if is_marker(line, DOWN_MARKER) => {
                    down_marker = Some((start, end));
                    break;
                }
                Some(_) => {}
            }
        }

        let up_body_start = up_body_start.ok_or_else(|| {
            BackofficeError::parse(&name, "missing \"-- migrate:up\" section")
        })?;

        let (up_sql, down_sql) = match down_marker {
            Some((marker_start, marker_end)) => (
                content[up_body_start..marker_start].trim(),
                Some(content[marker_end..].trim()).filter(|sql| !sql.is_empty()),
            ),
            None => (content[up_body_start..].trim(), None),
        };

        if up_sql.is_empty() {
            return Err(BackofficeError::parse(&name, "empty \"up\" section"));
        }

        Ok(Self {
            name,
            up_sql: up_sql.to_string(),
            down_sql: down_sql.map(str::to_string),
        })
    }
}

/// Yields each line (terminator included) with its byte offset in `content`.
fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    content.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line)
    })
}

/// `--` followed by the marker, alone on the line; surrounding whitespace allowed.
fn is_marker(line: &str, marker: &str) -> bool {
    line.trim()
        .strip_prefix("--")
        .map(|rest| rest.trim_start().eq_ignore_ascii_case(marker))
        .unwrap_or(false)
}
