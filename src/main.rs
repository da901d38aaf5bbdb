//! Command-line interface for docbatch
//!
//! # Usage Examples
//!
//! ```bash
//! # Generate one document per CSV row
//! docbatch generate \
//!   --data people.csv \
//!   --template templates/letter.txt \
//!   --output out \
//!   --folder-field dept --file-field name
//!
//! # Route rows to templates by field value
//! docbatch map --config config.json --field kind --value memo --template templates/memo.txt
//! docbatch generate --data people.csv --template templates/letter.txt \
//!   --mapping config.json --output out --folder-field dept --file-field name
//!
//! # List the values of a field to build rules from
//! docbatch values --data people.csv --field kind
//! ```

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use docbatch::{
    CancelToken, GenerateRequest, PlaceholderRenderer, ProgressEvent, RunResult,
    TemplateMapping, field_values, generate, read_rows,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use tracing::{info, warn};

/// Errors listed in the summary before the rest are elided.
const SUMMARY_ERRORS: usize = 5;

#[derive(Parser)]
#[command(name = "docbatch")]
#[command(about = "Generate one document per data row from text templates")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every row of a CSV file into a document
    Generate {
        /// CSV file with a header row
        #[arg(long, value_name = "PATH")]
        data: PathBuf,

        /// Base template used when no mapping rule applies
        #[arg(long, value_name = "PATH")]
        template: Option<PathBuf>,

        /// JSON template mapping (field -> value -> template)
        #[arg(long, value_name = "PATH")]
        mapping: Option<PathBuf>,

        /// Output root directory
        #[arg(long, value_name = "DIR")]
        output: PathBuf,

        /// Field naming the output folder
        #[arg(long)]
        folder_field: String,

        /// Field naming the output file
        #[arg(long)]
        file_field: String,

        /// Keep unresolved placeholders instead of failing the row
        #[arg(long)]
        ignore_missing: bool,

        /// Process all rows on the calling thread
        #[arg(long)]
        single_worker: bool,

        /// Worker count (default: available parallelism, at most 8)
        #[arg(long, env = "DOCBATCH_WORKERS")]
        workers: Option<usize>,

        /// Output file extension (default: each row's template extension)
        #[arg(long)]
        extension: Option<String>,
    },
    /// Add or replace a rule in a mapping file
    Map {
        /// Mapping file, created if missing
        #[arg(long, value_name = "PATH", default_value = "config.json")]
        config: PathBuf,

        #[arg(long)]
        field: String,

        #[arg(long)]
        value: String,

        #[arg(long, value_name = "PATH")]
        template: PathBuf,

        /// Field evaluation order, comma separated
        #[arg(long, value_delimiter = ',')]
        priority: Option<Vec<String>>,
    },
    /// Print the distinct values of a field
    Values {
        #[arg(long, value_name = "PATH")]
        data: PathBuf,

        #[arg(long)]
        field: String,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            data,
            template,
            mapping,
            output,
            folder_field,
            file_field,
            ignore_missing,
            single_worker,
            workers,
            extension,
        } => {
            let rows = read_rows(&data)?;
            info!(rows = rows.len(), "loaded {}", data.display());
            let template_mapping = mapping
                .map(|path| {
                    TemplateMapping::load(&path)
                        .with_context(|| format!("Failed to load mapping from {path:?}"))
                })
                .transpose()?;

            let request = GenerateRequest {
                rows,
                folder_field,
                file_field,
                ignore_missing,
                output_root: output,
                base_template: template,
                template_mapping,
                use_multi_worker: !single_worker,
                max_workers: workers,
                extension,
            };

            // Ctrl-C stops the run at the next row or chunk boundary.
            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            ctrlc::set_handler(move || {
                warn!("interrupt received, stopping after in-flight rows");
                on_interrupt.cancel();
            })
            .context("Failed to install Ctrl-C handler")?;

            let (tx, rx) = crossbeam_channel::unbounded::<ProgressEvent>();
            let reporter = thread::spawn(move || {
                for event in rx {
                    info!("[{:>3}%] {}", event.percent, event.message);
                }
            });
            let result = generate(request, &PlaceholderRenderer, &cancel, &tx);
            drop(tx);
            if reporter.join().is_err() {
                warn!("progress reporter thread panicked");
            }

            if let Some(fatal) = &result.fatal_error {
                bail!("document generation failed: {fatal}");
            }

            for line in summary(&result) {
                println!("{line}");
            }
            if result.cancelled {
                bail!("document generation cancelled");
            }
            if result.successful_count == 0 && !result.error_messages.is_empty() {
                bail!("no documents were generated");
            }
        }
        Commands::Map {
            config,
            field,
            value,
            template,
            priority,
        } => {
            let mut mapping = if config.exists() {
                TemplateMapping::load(&config)?
            } else {
                TemplateMapping::new()
            };
            mapping.insert(field, value, template);
            if let Some(order) = priority {
                mapping = mapping.with_priority(order);
            }
            mapping.save(&config)?;
            println!("Mapping saved to {}", config.display());
        }
        Commands::Values { data, field } => {
            let rows = read_rows(&data)?;
            for value in field_values(&rows, &field) {
                println!("{value}");
            }
        }
    }

    Ok(())
}

/// Lines printed after a run: the success count, the first few errors and,
/// for an interrupted run, a note that it stopped early.
fn summary(result: &RunResult) -> Vec<String> {
    let mut lines = vec![format!("Generated {} documents", result.successful_count)];
    if !result.error_messages.is_empty() {
        lines.push("Errors:".to_string());
        lines.extend(
            result
                .error_messages
                .iter()
                .take(SUMMARY_ERRORS)
                .map(|m| format!("  {m}")),
        );
        if result.error_messages.len() > SUMMARY_ERRORS {
            lines.push(format!(
                "  ... and {} more errors",
                result.error_messages.len() - SUMMARY_ERRORS
            ));
        }
    }
    if result.cancelled {
        lines.push("Cancelled: remaining rows were not processed".to_string());
    }
    lines
}
