use crate::cache::TemplateCache;
use crate::error::FatalError;
use crate::executor::{JobConfig, Outcome, execute_job};
use crate::mapping::TemplateMapping;
use crate::progress::{CancelToken, ProgressEvent, ProgressSink};
use crate::render::Renderer;
use crate::row::Row;
use crossbeam_channel::unbounded;
use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Datasets at or below this size always run on a single worker.
pub const SINGLE_WORKER_THRESHOLD: usize = 50;
/// Upper bound on the default worker count.
pub const MAX_WORKERS: usize = 8;
/// Smallest chunk handed to a worker.
pub const MIN_CHUNK_SIZE: usize = 50;
/// Sequential mode reports progress every this many rows.
pub const PROGRESS_EVERY: usize = 10;

/// Inputs of one generation run.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// Rows to render; row indices in messages count from 1.
    pub rows: Vec<Row>,
    /// Field whose value names the output folder.
    pub folder_field: String,
    /// Field whose value names the output file.
    pub file_field: String,
    /// Keep unresolved placeholders instead of failing the row.
    pub ignore_missing: bool,
    /// Directory under which per-row folders are created.
    pub output_root: PathBuf,
    /// Template for rows no mapping rule matches. A given but missing base
    /// template is fatal.
    pub base_template: Option<PathBuf>,
    pub template_mapping: Option<TemplateMapping>,
    /// Allow the worker pool for datasets above [`SINGLE_WORKER_THRESHOLD`].
    pub use_multi_worker: bool,
    /// Worker count override; defaults to `min(available parallelism, MAX_WORKERS)`.
    pub max_workers: Option<usize>,
    /// Output extension override (without the dot). When unset, each
    /// document takes the extension of the template it was rendered from.
    pub extension: Option<String>,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            folder_field: String::new(),
            file_field: String::new(),
            ignore_missing: false,
            output_root: PathBuf::from("."),
            base_template: None,
            template_mapping: None,
            use_multi_worker: true,
            max_workers: None,
            extension: None,
        }
    }
}

impl GenerateRequest {
    #[must_use]
    pub fn new(rows: Vec<Row>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            rows,
            output_root: output_root.into(),
            ..Default::default()
        }
    }

}

/// Terminal artifact of one run.
#[derive(Clone, Debug, Default)]
pub struct RunResult {
    /// Documents written.
    pub successful_count: usize,
    /// Row and chunk errors, each prefixed with its row; a fatal error's
    /// message when the run could not start.
    pub error_messages: Vec<String>,
    pub fatal_error: Option<FatalError>,
    /// The run stopped early because cancellation was observed.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunResult {
    fn fatal(err: FatalError, started: Instant) -> Self {
        Self {
            error_messages: vec![err.to_string()],
            fatal_error: Some(err),
            elapsed: started.elapsed(),
            ..Default::default()
        }
    }

    fn absorb(&mut self, outcome: Outcome) {
        if outcome.success {
            self.successful_count += 1;
        }
        self.error_messages.extend(outcome.errors);
    }
}

/// How a run is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel { workers: usize, chunk_size: usize },
}

impl ExecMode {
    /// Pick the mode for `total` rows.
    #[must_use]
    pub fn plan(total: usize, use_multi_worker: bool, max_workers: Option<usize>) -> Self {
        if !use_multi_worker || total <= SINGLE_WORKER_THRESHOLD {
            return Self::Sequential;
        }
        let workers = max_workers
            .unwrap_or_else(|| num_cpus::get().min(MAX_WORKERS))
            .max(1);
        let chunk_size = MIN_CHUNK_SIZE.max(total / workers);
        Self::Parallel {
            workers,
            chunk_size,
        }
    }
}

/// A contiguous, self-contained slice of the dataset.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// Row index (1-based) of the first entry.
    pub start: usize,
    pub rows: Vec<(usize, Row)>,
    pub config: Arc<JobConfig>,
}

/// Split rows into contiguous chunks of `chunk_size`, numbering rows from 1.
#[must_use]
pub fn partition(rows: Vec<Row>, chunk_size: usize, config: &Arc<JobConfig>) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    let mut chunks: Vec<Chunk> = Vec::with_capacity(rows.len().div_ceil(chunk_size));
    for (i, row) in rows.into_iter().enumerate() {
        let index = i + 1;
        if i % chunk_size == 0 {
            chunks.push(Chunk {
                start: index,
                rows: Vec::with_capacity(chunk_size),
                config: Arc::clone(config),
            });
        }
        if let Some(chunk) = chunks.last_mut() {
            chunk.rows.push((index, row));
        }
    }
    chunks
}

/// What a worker sends back for one chunk.
#[derive(Debug)]
struct ChunkReport {
    start: usize,
    successes: usize,
    errors: Vec<String>,
    template_reads: usize,
    elapsed: Duration,
}

/// Generate one document per row.
///
/// Runs fatal precondition checks, pre-creates output folders, then executes
/// sequentially or on a worker pool (see [`ExecMode::plan`]). Cancellation via
/// `cancel` stops the run at the next row or chunk boundary and is not an
/// error. Progress is reported to `progress` from the calling thread only.
pub fn generate(
    request: GenerateRequest,
    renderer: &dyn Renderer,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> RunResult {
    info!("starting document generation");
    let started = Instant::now();
    let total = request.rows.len();

    if total == 0 {
        progress.report(ProgressEvent::new(0, "nothing to generate"));
        return RunResult {
            elapsed: started.elapsed(),
            ..Default::default()
        };
    }

    if let Some(base) = request.base_template.as_deref()
        && !base.as_os_str().is_empty()
        && !base.exists()
    {
        let err = FatalError::BaseTemplateMissing(base.to_path_buf());
        error!("{err}");
        return RunResult::fatal(err, started);
    }

    let usable_templates = usable_templates(&request);
    if usable_templates.is_empty() {
        let err = FatalError::NoUsableTemplates;
        error!("{err}");
        return RunResult::fatal(err, started);
    }
    info!(templates = usable_templates.len(), "verified template files");

    let GenerateRequest {
        rows,
        folder_field,
        file_field,
        ignore_missing,
        output_root,
        base_template,
        template_mapping,
        use_multi_worker,
        max_workers,
        extension,
    } = request;
    let config = Arc::new(JobConfig {
        folder_field,
        file_field,
        ignore_missing,
        output_root,
        base_template,
        template_mapping,
        usable_templates,
        extension,
    });

    create_output_folders(&rows, &config);

    let mut result = match ExecMode::plan(total, use_multi_worker, max_workers) {
        ExecMode::Sequential => run_sequential(&rows, &config, renderer, cancel, progress),
        ExecMode::Parallel {
            workers,
            chunk_size,
        } => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => {
                info!(workers, chunk_size, "generating on worker pool");
                let chunks = partition(rows, chunk_size, &config);
                run_parallel(&pool, chunks, renderer, cancel, progress)
            }
            Err(e) => {
                warn!("worker pool unavailable, falling back to a single worker: {e}");
                run_sequential(&rows, &config, renderer, cancel, progress)
            }
        },
    };

    result.elapsed = started.elapsed();
    let secs = result.elapsed.as_secs_f64();
    info!(
        succeeded = result.successful_count,
        failed = result.error_messages.len(),
        cancelled = result.cancelled,
        "document generation finished in {secs:.2}s"
    );
    progress.report(ProgressEvent::new(
        100,
        format!("document generation finished in {secs:.2}s"),
    ));
    result
}

/// Base template plus every mapping target that exists and can be opened.
fn usable_templates(request: &GenerateRequest) -> HashSet<PathBuf> {
    let candidates = request
        .base_template
        .iter()
        .map(PathBuf::as_path)
        .chain(request.template_mapping.iter().flat_map(TemplateMapping::template_paths));

    candidates
        .filter(|p| !p.as_os_str().is_empty() && p.is_file() && File::open(p).is_ok())
        .map(Path::to_path_buf)
        .collect()
}

fn create_output_folders(rows: &[Row], config: &JobConfig) {
    let folders: BTreeSet<PathBuf> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| config.folder_path(i + 1, row))
        .collect();
    info!(count = folders.len(), "creating output folders");
    for folder in folders {
        if let Err(e) = fs::create_dir_all(&folder) {
            warn!("failed to create folder {}: {e}", folder.display());
        }
    }
}

fn run_sequential(
    rows: &[Row],
    config: &JobConfig,
    renderer: &dyn Renderer,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> RunResult {
    let total = rows.len();
    let mut result = RunResult::default();
    let mut cache = TemplateCache::new();

    for (i, row) in rows.iter().enumerate() {
        let index = i + 1;
        if cancel.is_cancelled() {
            info!(row = index, "document generation cancelled");
            result.cancelled = true;
            break;
        }
        if index % PROGRESS_EVERY == 0 || index == total {
            progress.report(ProgressEvent::new(
                ProgressEvent::percent_of(index, total),
                format!("generating document {index}/{total}..."),
            ));
        }

        result.absorb(run_row(index, row, config, &mut cache, renderer));
    }
    result
}

/// [`execute_job`] with a panic turned into that row's error.
fn run_row(
    index: usize,
    row: &Row,
    config: &JobConfig,
    cache: &mut TemplateCache,
    renderer: &dyn Renderer,
) -> Outcome {
    panic::catch_unwind(AssertUnwindSafe(|| {
        execute_job(index, row, config, cache, renderer)
    }))
    .unwrap_or_else(|payload| {
        let message = format!(
            "row {index}: document generation failed: {}",
            panic_message(payload.as_ref())
        );
        warn!(row = index, "{message}");
        Outcome::failed(message)
    })
}

fn run_chunk(chunk: Chunk, renderer: &dyn Renderer, cancel: &CancelToken) -> ChunkReport {
    let started = Instant::now();
    let mut cache = TemplateCache::new();
    let mut merged = RunResult::default();
    for (index, row) in &chunk.rows {
        if cancel.is_cancelled() {
            break;
        }
        merged.absorb(run_row(*index, row, &chunk.config, &mut cache, renderer));
    }
    ChunkReport {
        start: chunk.start,
        successes: merged.successful_count,
        errors: merged.error_messages,
        template_reads: cache.reads(),
        elapsed: started.elapsed(),
    }
}

fn run_parallel(
    pool: &rayon::ThreadPool,
    chunks: Vec<Chunk>,
    renderer: &dyn Renderer,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> RunResult {
    let total_chunks = chunks.len();
    let mut result = RunResult::default();
    let (tx, rx) = unbounded::<Result<ChunkReport, String>>();

    // The scope returns only after every spawned chunk has stopped, so no
    // worker writes output once the run has reported back. Row panics are
    // caught in `run_row`; the outer catch covers the chunk loop itself.
    pool.in_place_scope(|scope| {
        for chunk in chunks {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let start = chunk.start;
                let report = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_chunk(chunk, renderer, cancel)
                }))
                .map_err(|payload| {
                    format!(
                        "worker failed for chunk starting at row {start}: {}",
                        panic_message(payload.as_ref())
                    )
                });
                // The receiver is gone once the run stopped merging.
                let _ = tx.send(report);
            });
        }
        drop(tx);

        let mut completed = 0usize;
        for report in &rx {
            if cancel.is_cancelled() {
                info!(completed, total_chunks, "document generation cancelled");
                result.cancelled = true;
                break;
            }
            completed += 1;
            let percent = ProgressEvent::percent_of(completed, total_chunks);
            match report {
                Ok(report) => {
                    info!(
                        start = report.start,
                        succeeded = report.successes,
                        failed = report.errors.len(),
                        template_reads = report.template_reads,
                        "chunk finished"
                    );
                    result.successful_count += report.successes;
                    result.error_messages.extend(report.errors);
                    progress.report(ProgressEvent::new(
                        percent,
                        format!(
                            "worker {completed}/{total_chunks} done (chunk took {:.1}s)",
                            report.elapsed.as_secs_f64()
                        ),
                    ));
                }
                Err(message) => {
                    error!("{message}");
                    result.error_messages.push(message);
                    progress.report(ProgressEvent::new(
                        percent,
                        format!("worker {completed}/{total_chunks} failed"),
                    ));
                }
            }
        }
    });
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
