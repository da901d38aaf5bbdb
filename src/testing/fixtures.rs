//! Pre-built rows and scratch directories for common scenarios.

use crate::row::{Row, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Departments cycled through by [`sample_rows`].
pub const SAMPLE_DEPARTMENTS: [&str; 3] = ["sales", "ops", "legal"];

/// `n` rows with fields `dept`, `name`, `kind` and `amount`.
///
/// Names are unique (`person_<i>`), `kind` alternates between `letter` and
/// `memo`, and `amount` is a whole-number float.
///
/// ```
/// use docbatch::testing::sample_rows;
///
/// let rows = sample_rows(4);
/// assert_eq!(rows.len(), 4);
/// assert_eq!(rows[0].lookup_string("name"), "person_1");
/// assert_eq!(rows[1].lookup_string("amount"), "200");
/// ```
#[must_use]
pub fn sample_rows(n: usize) -> Vec<Row> {
    (1..=n)
        .map(|i| {
            Row::new()
                .with("dept", SAMPLE_DEPARTMENTS[(i - 1) % SAMPLE_DEPARTMENTS.len()])
                .with("name", format!("person_{i}"))
                .with("kind", if i % 2 == 0 { "memo" } else { "letter" })
                .with("amount", Value::Float(i as f64 * 100.0))
        })
        .collect()
}

/// A scratch directory with a `templates/` and an `out/` subdirectory,
/// removed when dropped.
pub struct TemplateDir {
    dir: TempDir,
}

impl TemplateDir {
    /// Create the directory tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("templates"))?;
        Ok(Self { dir })
    }

    /// Write a template file and return its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_template(&self, name: &str, body: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join("templates").join(name);
        fs::write(&path, body)?;
        Ok(path)
    }

    /// Path of a template that was never written.
    #[must_use]
    pub fn missing_template(&self, name: &str) -> PathBuf {
        self.dir.path().join("templates").join(name)
    }

    /// Output root for generation runs.
    #[must_use]
    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
