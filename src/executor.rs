//! Single-row job execution.
//!
//! [`execute_job`] turns one row into one output document: it allocates the
//! output path, picks and validates the template, builds the context, renders
//! and saves. Every failure is captured in the returned [`Outcome`] with the
//! row index in the message; nothing here aborts the batch.

use crate::cache::TemplateCache;
use crate::context::{Context, build_context};
use crate::error::RenderError;
use crate::mapping::{TemplateMapping, resolve_template};
use crate::naming::{default_file_name, default_folder_name, sanitize_filename, unique_file_path};
use crate::render::Renderer;
use crate::row::Row;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension used when neither the run nor the selected template names one.
pub const DEFAULT_EXTENSION: &str = "docx";

/// Read-only configuration shared by every job of a run.
#[derive(Clone, Debug, Default)]
pub struct JobConfig {
    /// Row field whose value names the output folder.
    pub folder_field: String,
    /// Row field whose value names the output file.
    pub file_field: String,
    /// Keep unresolved placeholders instead of failing the row.
    pub ignore_missing: bool,
    /// Directory under which per-row folders are created.
    pub output_root: PathBuf,
    /// Template for rows no mapping rule matches.
    pub base_template: Option<PathBuf>,
    /// Per-row template rules.
    pub template_mapping: Option<TemplateMapping>,
    /// Templates verified to exist and be readable before dispatch.
    pub usable_templates: HashSet<PathBuf>,
    /// Output extension override, without the dot.
    pub extension: Option<String>,
}

impl JobConfig {
    /// Output folder for row `index` (1-based).
    #[must_use]
    pub fn folder_path(&self, index: usize, row: &Row) -> PathBuf {
        let folder = sanitize_filename(
            &row.lookup_string(&self.folder_field),
            &default_folder_name(index),
        );
        self.output_root.join(folder)
    }

    /// Candidate output file for row `index` rendered from `template`, before
    /// collision handling.
    ///
    /// The extension is the configured override, else the template's own,
    /// else [`DEFAULT_EXTENSION`].
    ///
    /// ```
    /// use docbatch::{JobConfig, Row};
    /// use std::path::{Path, PathBuf};
    ///
    /// let config = JobConfig {
    ///     folder_field: "dept".into(),
    ///     file_field: "name".into(),
    ///     output_root: PathBuf::from("out"),
    ///     ..Default::default()
    /// };
    /// let row = Row::new().with("dept", "ops").with("name", "Ada");
    /// assert_eq!(
    ///     config.output_path(1, &row, Path::new("t/memo.txt")),
    ///     Path::new("out/ops/Ada.txt")
    /// );
    /// ```
    #[must_use]
    pub fn output_path(&self, index: usize, row: &Row, template: &Path) -> PathBuf {
        let file = sanitize_filename(
            &row.lookup_string(&self.file_field),
            &default_file_name(index),
        );
        let extension = self
            .extension
            .as_deref()
            .or_else(|| template.extension().and_then(|e| e.to_str()))
            .unwrap_or(DEFAULT_EXTENSION);
        self.folder_path(index, row).join(format!("{file}.{extension}"))
    }

    fn base(&self) -> &Path {
        self.base_template.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

/// Everything needed to render one row.
#[derive(Clone, Debug)]
pub struct Job {
    /// Row index, 1-based.
    pub index: usize,
    /// Usable template the row resolved to.
    pub template: PathBuf,
    /// Collision-free output path.
    pub output: PathBuf,
    pub context: Context,
}

/// Result of one job.
///
/// A successful job has no errors; a failed one has exactly one message,
/// prefixed with the row index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl Outcome {
    /// A document was written.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// The row failed with `message`.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
        }
    }
}

/// Resolve output path, template and context for a row.
///
/// # Errors
/// Returns the row's error message if no usable template applies.
pub fn plan_job(index: usize, row: &Row, config: &JobConfig) -> Result<Job, String> {
    let template = resolve_template(row, config.template_mapping.as_ref(), config.base());
    if template.as_os_str().is_empty() {
        return Err(format!("row {index}: no template configured"));
    }
    if !config.usable_templates.contains(&template) {
        return Err(format!(
            "row {index}: template unavailable: {}",
            template.display()
        ));
    }

    let output = unique_file_path(&config.output_path(index, row, &template));
    Ok(Job {
        index,
        template,
        output,
        context: build_context(row),
    })
}

/// Run one row to completion.
pub fn execute_job(
    index: usize,
    row: &Row,
    config: &JobConfig,
    cache: &mut TemplateCache,
    renderer: &dyn Renderer,
) -> Outcome {
    let outcome = match plan_job(index, row, config) {
        Ok(job) => match render_and_save(&job, config.ignore_missing, cache, renderer) {
            Ok(()) => {
                debug!(row = index, output = %job.output.display(), "document written");
                Outcome::ok()
            }
            Err(message) => Outcome::failed(message),
        },
        Err(message) => Outcome::failed(message),
    };
    for message in &outcome.errors {
        warn!(row = index, "{message}");
    }
    outcome
}

fn render_and_save(
    job: &Job,
    ignore_missing: bool,
    cache: &mut TemplateCache,
    renderer: &dyn Renderer,
) -> Result<(), String> {
    let index = job.index;
    let mut handle = cache
        .load(&job.template)
        .map_err(|e| format!("row {index}: document generation failed: {e:#}"))?;

    match renderer.render(&mut handle, &job.context) {
        Ok(()) => {}
        Err(RenderError::MissingPlaceholder(_)) if ignore_missing => renderer
            .render_keep_unresolved(&mut handle, &job.context)
            .map_err(|e| format!("row {index}: document generation failed: {e}"))?,
        Err(e @ RenderError::MissingPlaceholder(_)) => {
            return Err(format!("row {index}: missing placeholder: {e}"));
        }
        Err(e) => return Err(format!("row {index}: document generation failed: {e}")),
    }

    renderer
        .save(&handle, &job.output)
        .map_err(|e| format!("row {index}: document generation failed: {e}"))
}
