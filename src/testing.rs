//! Testing utilities for document generation runs.
//!
//! - **Fixtures**: sample rows and a scratch directory holding templates and output
//! - **Mocks**: renderers that fail or panic on chosen rows, progress sinks that
//!   record events or trigger cancellation
//! - **Assertions**: checks over a [`crate::RunResult`] and the files it produced
//!
//! # Quick Start
//!
//! ```no_run
//! use docbatch::*;
//! use docbatch::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = TemplateDir::new()?;
//! let base = dir.write_template("base.txt", "Hello {{ name }}")?;
//!
//! let mut request = GenerateRequest::new(sample_rows(3), dir.output());
//! request.folder_field = "dept".into();
//! request.file_field = "name".into();
//! request.base_template = Some(base);
//!
//! let result = generate(request, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);
//! assert_run(&result, 3, 0);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mocks;

pub use assertions::*;
pub use fixtures::*;
pub use mocks::*;
