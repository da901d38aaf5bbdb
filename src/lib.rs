//! # docbatch
//!
//! A **batch document generation engine**: merge every row of a tabular dataset
//! into a template, choosing the template per row from a configurable mapping,
//! and write one output document per row.
//!
//! ## Key Features
//!
//! - **Per-row template selection** - field → value → template rules with an optional priority order
//! - **Safe, collision-free output paths** - `<root>/<folder>/<file>.<ext>` from row fields
//! - **Sequential and parallel execution** - a single worker for small runs, a chunked Rayon pool otherwise
//! - **Partial failure** - a bad row is recorded and the batch carries on
//! - **Progress and cancellation** - progress events from the orchestrating thread, cooperative cancel
//! - **CSV row loading** and **JSON mapping persistence**
//!
//! ## Quick Start
//!
//! ```no_run
//! use docbatch::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let rows = vec![
//!     Row::new().with("dept", "sales").with("name", "Ada").with("kind", "memo"),
//!     Row::new().with("dept", "ops").with("name", "Grace").with("kind", "letter"),
//! ];
//!
//! let mapping = TemplateMapping::new().with_rule("kind", "memo", "templates/memo.txt");
//!
//! let mut request = GenerateRequest::new(rows, "out");
//! request.folder_field = "dept".into();
//! request.file_field = "name".into();
//! request.base_template = Some("templates/letter.txt".into());
//! request.template_mapping = Some(mapping);
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let result = generate(request, &PlaceholderRenderer, &CancelToken::new(), &tx);
//! for event in rx.try_iter() {
//!     println!("{:>3}% {}", event.percent, event.message);
//! }
//! println!("{} documents, {} errors", result.successful_count, result.error_messages.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution Modes
//!
//! [`ExecMode::plan`] picks the mode for a run:
//! - **Sequential** - when multi-worker execution is disabled or there are at most
//!   [`SINGLE_WORKER_THRESHOLD`] rows; cancellation is checked before every row
//! - **Parallel** - rows are split into contiguous [`Chunk`]s of at least
//!   [`MIN_CHUNK_SIZE`] rows, each processed by one worker with its own
//!   [`TemplateCache`]; results are merged in completion order
//!
//! ## Errors
//!
//! Only the preconditions in [`FatalError`] stop a run. Everything else is a
//! per-row (or, for a crashed worker, per-chunk) message in
//! [`RunResult::error_messages`], prefixed with the row index.
//!
//! ## Module Overview
//!
//! - [`row`] - `Row` and `Value`
//! - [`naming`] - filename sanitizing and unique output paths
//! - [`mapping`] - template selection and mapping persistence
//! - [`context`] - substitution context construction
//! - [`cache`] - per-worker template cache
//! - [`render`] - the `Renderer` seam and the built-in placeholder renderer
//! - [`executor`] - single-row jobs
//! - [`scheduler`] - the `generate` entry point
//! - [`progress`] - progress events and cancellation
//! - [`io`] - row loaders
//! - [`testing`] - fixtures, mocks and assertions for tests

pub mod cache;
pub mod context;
pub mod error;
pub mod executor;
pub mod io;
pub mod mapping;
pub mod naming;
pub mod progress;
pub mod render;
pub mod row;
pub mod scheduler;
pub mod testing;

// General re-exports
pub use cache::TemplateCache;
pub use context::{Context, IDENTIFIER_KEY, build_context};
pub use error::{FatalError, RenderError};
pub use executor::{DEFAULT_EXTENSION, Job, JobConfig, Outcome, execute_job, plan_job};
pub use mapping::{PRIORITY_KEY, TemplateMapping, resolve_template};
pub use progress::{CancelToken, NoProgress, ProgressEvent, ProgressSink};
pub use render::{PlaceholderRenderer, Renderer, TemplateHandle};
pub use row::{Row, Value};
pub use scheduler::{
    Chunk, ExecMode, GenerateRequest, MAX_WORKERS, MIN_CHUNK_SIZE, RunResult,
    SINGLE_WORKER_THRESHOLD, generate,
};

// Gated re-exports
#[cfg(feature = "io-csv")]
pub use io::csv::{field_values, read_rows};
