//! Error types callers are expected to match on.
//!
//! Plumbing (file loading, CSV parsing, mapping persistence) reports through
//! [`anyhow::Error`]; the enums here cover the two places where the variant
//! changes what happens next.

use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop a run before any job is dispatched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    #[error("base template does not exist: {}", .0.display())]
    BaseTemplateMissing(PathBuf),
    #[error("no usable template files")]
    NoUsableTemplates,
}

/// Failure reported by a [`crate::render::Renderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template references names the context does not define.
    #[error("not found in context: {}", .0.join(", "))]
    MissingPlaceholder(Vec<String>),
    #[error("invalid template: {0}")]
    Template(String),
    #[error("template has not been rendered")]
    NotRendered,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
