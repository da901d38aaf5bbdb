//! The rendering seam.
//!
//! The engine treats template rendering as a black box behind [`Renderer`]:
//! render a fresh [`TemplateHandle`] with a context (strictly, or keeping
//! unresolved placeholders), then save the result. [`PlaceholderRenderer`] is
//! the built-in implementation for UTF-8 text templates using `{{ name }}`
//! placeholders.

use crate::context::Context;
use crate::error::RenderError;
use crate::naming::normalize_field_name;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

/// A single-use template instance.
///
/// Source bytes are shared with the [`crate::cache::TemplateCache`] that
/// produced the handle; rendered output is private to the handle. Handles are
/// deliberately `!Send`: they live and die on one worker.
#[derive(Debug)]
pub struct TemplateHandle {
    path: PathBuf,
    source: Rc<[u8]>,
    rendered: Option<Vec<u8>>,
}

impl TemplateHandle {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, source: Rc<[u8]>) -> Self {
        Self {
            path: path.into(),
            source,
            rendered: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    #[must_use]
    pub fn rendered(&self) -> Option<&[u8]> {
        self.rendered.as_deref()
    }

    /// Store the rendered output; [`Renderer::save`] writes it.
    pub fn set_rendered(&mut self, output: Vec<u8>) {
        self.rendered = Some(output);
    }
}

/// Template rendering engine contract.
///
/// Implementations are shared by every worker of a run and must not keep
/// per-render state outside the handle.
pub trait Renderer: Send + Sync {
    /// Substitute every placeholder; fail with
    /// [`RenderError::MissingPlaceholder`] if any name is not in `context`.
    ///
    /// # Errors
    /// Returns an error if the template is invalid or a placeholder is unresolved.
    fn render(&self, template: &mut TemplateHandle, context: &Context) -> Result<(), RenderError>;

    /// Substitute what `context` defines and leave the rest as written.
    ///
    /// # Errors
    /// Returns an error if the template is invalid.
    fn render_keep_unresolved(
        &self,
        template: &mut TemplateHandle,
        context: &Context,
    ) -> Result<(), RenderError>;

    /// Persist the rendered output.
    ///
    /// # Errors
    /// Returns an error if nothing was rendered or the file cannot be written.
    fn save(&self, template: &TemplateHandle, path: &Path) -> Result<(), RenderError>;
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid placeholder regex"));

/// Renders UTF-8 text templates with `{{ name }}` placeholders.
///
/// A placeholder name resolves against the context by its literal name first,
/// then by its normalized form (spaces replaced with `_`).
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderRenderer;

impl PlaceholderRenderer {
    fn substitute(
        template: &mut TemplateHandle,
        context: &Context,
        keep_unresolved: bool,
    ) -> Result<(), RenderError> {
        let text = std::str::from_utf8(template.source()).map_err(|e| {
            RenderError::Template(format!("{} is not UTF-8: {e}", template.path().display()))
        })?;

        let mut missing: Vec<String> = Vec::new();
        let out = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            let value = context
                .get(name)
                .or_else(|| context.get(normalize_field_name(name).as_ref()));
            match value {
                Some(v) => v.clone(),
                None => {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });

        if !missing.is_empty() && !keep_unresolved {
            return Err(RenderError::MissingPlaceholder(missing));
        }
        template.set_rendered(out.into_owned().into_bytes());
        Ok(())
    }
}

impl Renderer for PlaceholderRenderer {
    fn render(&self, template: &mut TemplateHandle, context: &Context) -> Result<(), RenderError> {
        Self::substitute(template, context, false)
    }

    fn render_keep_unresolved(
        &self,
        template: &mut TemplateHandle,
        context: &Context,
    ) -> Result<(), RenderError> {
        Self::substitute(template, context, true)
    }

    fn save(&self, template: &TemplateHandle, path: &Path) -> Result<(), RenderError> {
        let bytes = template.rendered().ok_or(RenderError::NotRendered)?;
        fs::write(path, bytes)?;
        Ok(())
    }
}
