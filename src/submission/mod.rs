//! Submission guard
//!
//! Validates and normalizes an agent-supplied mapping of relative file
//! path to text content before it may become a code-submission patch.
//! Every rule is a hard rejection; nothing is partially accepted. Paths
//! are rewritten to their normalized form before any downstream use, so a
//! traversal-bearing original string never reaches storage or an external
//! API call.

use std::collections::BTreeMap;

use crate::types::{BoardError, Result};

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of files in one submission
pub const MAX_FILES: usize = 20;

/// Maximum length of a single file path
pub const MAX_PATH_LEN: usize = 200;

/// Maximum UTF-8 byte size of a single file (100 KiB)
pub const MAX_FILE_BYTES: usize = 100 * 1024;

/// Maximum aggregate UTF-8 byte size of a submission (500 KiB)
pub const MAX_TOTAL_BYTES: usize = 500 * 1024;

/// File names and directory prefixes a submission may never touch:
/// version-control internals, CI configuration, repository tooling, the
/// board's own source, and the specification tree.
pub const PROTECTED_PATHS: &[&str] = &[".git", ".github", "ci", "tools", "board", "spec"];

// =============================================================================
// Validation
// =============================================================================

/// Validate a submission file map and return it with normalized paths.
pub fn validate_files(files: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    if files.is_empty() {
        return Err(BoardError::BadRequest("submission contains no files".to_string()));
    }
    if files.len() > MAX_FILES {
        return Err(BoardError::BadRequest(format!(
            "submission exceeds {} files",
            MAX_FILES
        )));
    }

    let mut normalized = BTreeMap::new();
    let mut total_bytes = 0usize;

    for (path, content) in files {
        if path.len() > MAX_PATH_LEN {
            return Err(BoardError::BadRequest(format!(
                "path exceeds {} characters: {}",
                MAX_PATH_LEN, path
            )));
        }

        let size = content.len();
        if size > MAX_FILE_BYTES {
            return Err(BoardError::BadRequest(format!(
                "file exceeds {} bytes: {}",
                MAX_FILE_BYTES, path
            )));
        }
        total_bytes += size;
        if total_bytes > MAX_TOTAL_BYTES {
            return Err(BoardError::BadRequest(format!(
                "submission exceeds {} total bytes",
                MAX_TOTAL_BYTES
            )));
        }

        let clean = normalize_path(path)?;
        check_protected(&clean)?;

        if normalized.insert(clean.clone(), content.clone()).is_some() {
            return Err(BoardError::BadRequest(format!(
                "paths collide after normalization: {}",
                clean
            )));
        }
    }

    Ok(normalized)
}

/// Normalize a relative path: split on both separators, drop empty and `.`
/// segments. A `..` segment surviving normalization is a traversal attempt
/// and is never silently resolved.
fn normalize_path(path: &str) -> Result<String> {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        return Err(BoardError::BadRequest(format!("empty path: {:?}", path)));
    }
    if segments.iter().any(|segment| *segment == "..") {
        return Err(BoardError::BadRequest(format!(
            "path traversal rejected: {}",
            path
        )));
    }

    Ok(segments.join("/"))
}

/// Reject paths equal to, or nested under, any protected entry.
fn check_protected(normalized: &str) -> Result<()> {
    for protected in PROTECTED_PATHS {
        if normalized == *protected
            || normalized
                .strip_prefix(protected)
                .is_some_and(|rest| rest.starts_with('/'))
        {
            return Err(BoardError::BadRequest(format!(
                "path touches protected location {}: {}",
                protected, normalized
            )));
        }
    }
    Ok(())
}
