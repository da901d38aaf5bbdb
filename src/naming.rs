//! Output naming: field-name normalization, filename sanitizing and
//! collision-free path allocation.

use regex::Regex;
use std::borrow::Cow;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ILLEGAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]+"#).expect("valid filename regex"));

/// Alternate spelling of a field name used by loaders that cannot keep
/// spaces in column identifiers (`"first name"` → `"first_name"`).
#[must_use]
pub fn normalize_field_name(name: &str) -> Cow<'_, str> {
    if name.contains(' ') {
        Cow::Owned(name.replace(' ', "_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Make `value` safe to use as a single path component.
///
/// Runs of `< > : " / \ | ? *` collapse into one `_`. If nothing is left after
/// trimming, `default_name` is returned instead.
///
/// ```
/// use docbatch::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a/b:c", "x"), "a_b_c");
/// assert_eq!(sanitize_filename("   ", "folder_1"), "folder_1");
/// ```
#[must_use]
pub fn sanitize_filename(value: &str, default_name: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return default_name.to_string();
    }
    ILLEGAL_CHARS.replace_all(trimmed, "_").into_owned()
}

/// Fallback folder name for row `idx`.
#[must_use]
pub fn default_folder_name(idx: usize) -> String {
    format!("folder_{idx}")
}

/// Fallback file name for row `idx`.
#[must_use]
pub fn default_file_name(idx: usize) -> String {
    format!("file_{idx}")
}

/// Return `path` if nothing exists there yet, otherwise the first of
/// `<stem>_1.<ext>`, `<stem>_2.<ext>`, … that does not exist.
///
/// Existence is checked at every probe, but the check and the eventual write
/// are not atomic: two workers racing on the same name can still collide.
#[must_use]
pub fn unique_file_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let ext = path.extension();

    let mut counter = 1u64;
    loop {
        let mut name = stem.clone();
        name.push(format!("_{counter}"));
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitize_strips_every_illegal_char() {
        let out = sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#, "x");
        assert_eq!(out, "a_b_c_d_e_f_g_h_i_j");
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(!out.contains(c));
        }
    }

    #[test]
    fn sanitize_collapses_runs_and_trims() {
        assert_eq!(sanitize_filename("  report??//2024  ", "x"), "report_2024");
    }

    #[test]
    fn sanitize_blank_yields_default() {
        assert_eq!(sanitize_filename("", "文件夹_3"), "文件夹_3");
        assert_eq!(sanitize_filename(" \t\n", "文件_3"), "文件_3");
    }

    #[test]
    fn sanitize_only_illegal_chars_is_not_blank() {
        assert_eq!(sanitize_filename("???", "x"), "_");
    }

    #[test]
    fn normalize_replaces_spaces_only_when_present() {
        assert!(matches!(normalize_field_name("plain"), Cow::Borrowed("plain")));
        assert_eq!(normalize_field_name("a b c"), "a_b_c");
    }

    #[test]
    fn unique_path_returns_input_when_free() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("doc.docx");
        assert_eq!(unique_file_path(&path), path);
        Ok(())
    }

    #[test]
    fn unique_path_never_repeats_once_taken() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("doc.docx");

        let first = unique_file_path(&path);
        fs::write(&first, b"1")?;
        let second = unique_file_path(&path);
        fs::write(&second, b"2")?;
        let third = unique_file_path(&path);

        assert_eq!(first, path);
        assert_eq!(second, tmp.path().join("doc_1.docx"));
        assert_eq!(third, tmp.path().join("doc_2.docx"));
        Ok(())
    }

    #[test]
    fn unique_path_without_extension() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("notes");
        fs::write(&path, b"x")?;
        assert_eq!(unique_file_path(&path), tmp.path().join("notes_1"));
        Ok(())
    }
}
