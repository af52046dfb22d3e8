use std::fmt;

/// A window of SQL around an error position, with a caret under the fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlContext {
    pub snippet: String,
    pub pointer: String,
}

impl SqlContext {
    /// Cut `radius` characters either side of `position`.
    ///
    /// `position` is 1-based and counted in characters, as Postgres reports
    /// it. Line breaks and tabs inside the window become spaces so the caret
    /// lines up with the character it points at.
    pub fn locate(sql: &str, position: usize, radius: usize) -> Self {
        let chars: Vec<char> = sql.chars().collect();
        let index = position.saturating_sub(1).min(chars.len());
        let start = index.saturating_sub(radius);
        let end = chars.len().min(index + radius);

        let snippet = chars[start..end]
            .iter()
            .map(|&c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
            .collect();
        let pointer = format!("{}^", ".".repeat(index - start));

        Self { snippet, pointer }
    }
}

impl fmt::Display for SqlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.snippet, self.pointer)
    }
}
