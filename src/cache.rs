//! Per-worker template cache.
//!
//! Each worker owns one [`TemplateCache`] for its lifetime (one chunk, or the
//! whole run in sequential mode). Raw template bytes are read from disk once per
//! path; every [`TemplateCache::load`] hands out a fresh [`TemplateHandle`]
//! because rendering mutates the handle. Entries are never evicted.

use crate::render::TemplateHandle;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: HashMap<PathBuf, Rc<[u8]>>,
    reads: usize,
}

impl TemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh handle for `path`, reading the file on first use only.
    ///
    /// # Errors
    /// Returns an error if the template has not been cached yet and cannot be read.
    pub fn load(&mut self, path: &Path) -> Result<TemplateHandle> {
        let bytes = match self.entries.get(path) {
            Some(bytes) => Rc::clone(bytes),
            None => {
                let raw = fs::read(path)
                    .with_context(|| format!("read template {}", path.display()))?;
                self.reads += 1;
                let bytes: Rc<[u8]> = Rc::from(raw);
                self.entries.insert(path.to_path_buf(), Rc::clone(&bytes));
                bytes
            }
        };
        Ok(TemplateHandle::new(path, bytes))
    }

    /// Number of distinct templates held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of times a template was read from disk.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads
    }
}
