//! Assertion functions for generation results.

use crate::scheduler::RunResult;
use std::fs;
use std::path::{Path, PathBuf};

/// Assert the success and error counts of a run, printing the errors on mismatch.
///
/// # Example
/// ```
/// use docbatch::RunResult;
/// use docbatch::testing::assert_run;
///
/// let result = RunResult {
///     successful_count: 2,
///     error_messages: vec!["row 3: template unavailable: memo.txt".into()],
///     ..Default::default()
/// };
/// assert_run(&result, 2, 1);
/// ```
///
/// # Panics
///
/// Panics if either count differs.
pub fn assert_run(result: &RunResult, successes: usize, errors: usize) {
    assert_eq!(
        (result.successful_count, result.error_messages.len()),
        (successes, errors),
        "Run mismatch:\n  Expected: {successes} succeeded, {errors} errors\n  Actual: {} succeeded, errors: {:#?}",
        result.successful_count,
        result.error_messages
    );
}

/// Assert that some error message mentions `row` and contains `needle`.
///
/// # Example
/// ```
/// use docbatch::RunResult;
/// use docbatch::testing::assert_row_error;
///
/// let result = RunResult {
///     error_messages: vec!["row 3: template unavailable: memo.txt".into()],
///     ..Default::default()
/// };
/// assert_row_error(&result, 3, "unavailable");
/// ```
///
/// # Panics
///
/// Panics if no error message matches.
pub fn assert_row_error(result: &RunResult, row: usize, needle: &str) {
    let prefix = format!("row {row}:");
    assert!(
        result
            .error_messages
            .iter()
            .any(|m| m.starts_with(&prefix) && m.contains(needle)),
        "No error for row {row} containing {needle:?}:\n  Errors: {:#?}",
        result.error_messages
    );
}

/// Every file below `root`, sorted. A missing `root` yields nothing.
///
/// # Panics
///
/// Panics if a directory entry cannot be read.
#[must_use]
pub fn output_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries {
            let path = entry.expect("readable directory entry").path();
            if path.is_dir() {
                pending.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}
