//! Filesystem tool operations: read, write, append, list.
//!
//! All paths arriving here have already passed containment; these functions
//! only do the I/O and formatting.

use std::path::Path;

use crate::errors::ToolError;

fn io_error(operation: &'static str, path: &Path, source: std::io::Error) -> ToolError {
    ToolError::Io {
        operation,
        path: path.display().to_string(),
        source,
    }
}

/// Read a file, returning its content and byte size.
pub async fn read_file(path: &Path) -> Result<(String, u64), ToolError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error("read", path, e))?;
    let size = content.len() as u64;
    Ok((content, size))
}

/// Write a file, creating parent directories. Returns bytes written.
pub async fn write_file(path: &Path, content: &str) -> Result<u64, ToolError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("create parent dirs", path, e))?;
    }
    tokio::fs::write(path, content.as_bytes())
        .await
        .map_err(|e| io_error("write", path, e))?;
    Ok(content.len() as u64)
}

/// Append to a file, inserting a newline separator when the existing
/// content lacks a trailing one. Returns bytes appended.
pub async fn append_file(path: &Path, content: &str) -> Result<u64, ToolError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("create parent dirs", path, e))?;
    }

    let existing = match tokio::fs::read_to_string(path).await {
        Ok(existing) => existing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(io_error("read", path, e)),
    };

    let mut combined = existing;
    if !combined.is_empty() && !combined.ends_with('\n') {
        combined.push('\n');
    }
    combined.push_str(content);

    tokio::fs::write(path, combined.as_bytes())
        .await
        .map_err(|e| io_error("append", path, e))?;
    Ok(content.len() as u64)
}

/// List a directory: directories first (with a trailing `/`), then files,
/// each group sorted by name. Dotfiles are omitted.
pub async fn list_dir(path: &Path) -> Result<String, ToolError> {
    let mut reader = tokio::fs::read_dir(path)
        .await
        .map_err(|e| io_error("list", path, e))?;

    let mut dirs: Vec<String> = Vec::new();
    let mut files: Vec<String> = Vec::new();

    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| io_error("list", path, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| io_error("list", path, e))?
            .is_dir();
        if is_dir {
            dirs.push(format!("{name}/"));
        } else {
            files.push(name);
        }
    }

    dirs.sort();
    files.sort();
    dirs.extend(files);

    if dirs.is_empty() {
        Ok("(empty directory)".to_owned())
    } else {
        Ok(dirs.join("\n"))
    }
}
