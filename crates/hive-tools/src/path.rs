//! Path containment.
//!
//! Every path argument is normalised and then proven to resolve inside the
//! project root. Normalisation: surrounding quotes stripped; absolute paths
//! coerced to project-relative by removing the project-root prefix or the
//! shared `/projects/` base; `.` and `..` components resolved lexically so
//! that not-yet-existing write targets can still be checked. The root is
//! canonicalised first, so symlinked roots compare correctly.

use std::path::{Component, Path, PathBuf};

use crate::errors::ToolError;

/// Shared base under which all project roots live.
const SHARED_BASE: &str = "/projects/";

/// Resolve a raw path argument against the project root, enforcing the
/// containment boundary.
///
/// Returns the absolute in-root path, or a containment error with the exact
/// message "path traversal not allowed".
pub fn contain(root: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let cleaned = strip_quotes(raw.trim());

    let relative = if Path::new(cleaned).is_absolute() {
        coerce_absolute(root, cleaned)?
    } else {
        cleaned.to_owned()
    };

    let normalized = normalize(&relative).ok_or_else(ToolError::traversal)?;

    // The root must already exist; canonicalising it collapses symlinks so
    // the prefix check below is meaningful.
    let canonical_root = root.canonicalize().map_err(|e| ToolError::Io {
        operation: "canonicalize",
        path: root.display().to_string(),
        source: e,
    })?;

    let resolved = canonical_root.join(normalized);
    if resolved.starts_with(&canonical_root) {
        Ok(resolved)
    } else {
        Err(ToolError::traversal())
    }
}

/// Strip one layer of surrounding single or double quotes.
fn strip_quotes(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Coerce an absolute path to project-relative by stripping the project
/// root or the shared base prefix. Any other absolute path is an escape.
fn coerce_absolute(root: &Path, absolute: &str) -> Result<String, ToolError> {
    if let Ok(rest) = Path::new(absolute).strip_prefix(root) {
        return Ok(rest.to_string_lossy().into_owned());
    }
    if let Some(rest) = absolute.strip_prefix(SHARED_BASE) {
        // The shared base includes the project name segment.
        let mut parts = rest.splitn(2, '/');
        let _project = parts.next();
        return Ok(parts.next().unwrap_or("").to_owned());
    }
    Err(ToolError::traversal())
}

/// Resolve `.` and `..` components lexically. `None` when `..` would climb
/// above the root.
fn normalize(relative: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
