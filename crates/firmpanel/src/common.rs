//! Shared utility functions used across the crate.
//!
//! Provides directory listing by file-name pattern ([`list_matching_files`]),
//! column allowlist parsing ([`parse_columns_file`]) and thousands formatting for
//! the finish messages ([`format_with_commas`]).

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::err::FirmPanelError;

/// Lists the regular files in `dir` whose file name matches `pattern`, sorted by name.
///
/// Returns [`FirmPanelError::NoInputFiles`] when nothing matches, since every
/// stage that lists a directory has nothing to do without input.
pub fn list_matching_files(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>, FirmPanelError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if pattern.is_match(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(FirmPanelError::NoInputFiles {
            dir: dir.to_string_lossy().to_string(),
            pattern: pattern.as_str().to_string(),
        });
    }

    files.sort();
    Ok(files)
}

/// Parses a columns file, returning one column name per non-empty line.
///
/// Lines starting with `#` are treated as comments and skipped.
/// Leading and trailing whitespace is trimmed from each line.
pub fn parse_columns_file(path: &Path) -> Result<Vec<String>, FirmPanelError> {
    let contents = std::fs::read_to_string(path)?;
    let names: Vec<String> = contents
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect();
    Ok(names)
}

/// Formats a number with comma thousands separators (e.g. 1081 -> "1,081").
pub fn format_with_commas(n: usize) -> String {
    let s = n.to_string();
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len <= 3 {
        return s;
    }
    let mut result = String::with_capacity(len + len / 3);
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(b as char);
    }
    result
}

/// Returns the file name of `path` for display, or `___` when there is none.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "___".to_string())
}
