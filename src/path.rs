//! Pure helpers for absolute, slash-delimited DFS paths.
//!
//! DFS paths are rooted at `/` and use `/` as the only separator. These
//! helpers normalise away duplicate and trailing separators; they never
//! touch the network.

use crate::error::{Error, Result};

/// The separator used between path components.
pub const SEPARATOR: char = '/';

/// Returns the root path.
pub fn root() -> &'static str {
    "/"
}

/// Joins `first` and any further segments into an absolute normalised path.
///
/// Rejects an empty `first` segment. Relative input is anchored at the
/// root, duplicate separators collapse, and a trailing separator is
/// stripped unless the result is the root itself.
pub fn join(first: &str, more: &[&str]) -> Result<String> {
    if first.is_empty() {
        return Err(Error::InvalidArgument("empty path segment".into()));
    }
    let mut raw = String::from(first);
    for segment in more {
        raw.push(SEPARATOR);
        raw.push_str(segment);
    }
    Ok(normalize(&raw))
}

/// Returns the final component of `path`, or `""` for the root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rsplit(SEPARATOR).next() {
        Some(name) => name,
        None => "",
    }
}

/// Fails with [`Error::InvalidArgument`] unless `path` begins with `/`.
pub fn require_absolute(path: &str) -> Result<()> {
    if path.starts_with(SEPARATOR) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("path is not absolute: {path:?}")))
    }
}

/// Collapses empty components and anchors the result at the root.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for component in path.split(SEPARATOR).filter(|c| !c.is_empty()) {
        out.push(SEPARATOR);
        out.push_str(component);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}
