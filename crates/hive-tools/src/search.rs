//! `search_files` — case-insensitive substring search across files
//! matching a glob pattern.
//!
//! Bounded on every axis: at most 20 matching files, at most 5 matching
//! lines per file, a 10-second budget for the whole sweep, and a 5-second
//! budget charged to each file read. The walk runs on the blocking pool.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use globset::GlobBuilder;
use tracing::debug;

use crate::errors::ToolError;

/// Search limits.
#[derive(Clone, Copy, Debug)]
pub struct SearchLimits {
    /// Maximum matching files reported.
    pub max_files: usize,
    /// Maximum matching lines reported per file.
    pub max_lines_per_file: usize,
    /// Budget for the whole sweep.
    pub sweep_timeout: Duration,
    /// Budget per file read.
    pub file_timeout: Duration,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_lines_per_file: 5,
            sweep_timeout: Duration::from_secs(10),
            file_timeout: Duration::from_secs(5),
        }
    }
}

/// Run the search. Zero matches is a success ("No matches found").
pub async fn search_files(
    root: &Path,
    pattern: &str,
    query: &str,
    limits: SearchLimits,
) -> Result<String, ToolError> {
    let root = root.to_path_buf();
    let pattern = pattern.to_owned();
    let query = query.to_owned();

    tokio::task::spawn_blocking(move || search_blocking(&root, &pattern, &query, limits))
        .await
        .map_err(|e| ToolError::Process {
            message: format!("search task failed: {e}"),
        })?
}

fn search_blocking(
    root: &Path,
    pattern: &str,
    query: &str,
    limits: SearchLimits,
) -> Result<String, ToolError> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map_err(|e| ToolError::Process {
            message: format!("invalid glob pattern {pattern:?}: {e}"),
        })?
        .compile_matcher();

    let query_lower = query.to_lowercase();
    let deadline = Instant::now() + limits.sweep_timeout;

    let mut output = String::new();
    let mut matched_files = 0usize;
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if Instant::now() >= deadline || matched_files >= limits.max_files {
            break;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<_> = entries.flatten().collect();
        children.sort_by_key(std::fs::DirEntry::file_name);

        for entry in children {
            if Instant::now() >= deadline || matched_files >= limits.max_files {
                break;
            }
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(&path);
            let name_matches = glob.is_match(relative) || glob.is_match(entry.file_name());
            if !name_matches {
                continue;
            }

            let file_deadline = Instant::now() + limits.file_timeout;
            if let Some(lines) = scan_file(&path, &query_lower, limits.max_lines_per_file, file_deadline) {
                matched_files += 1;
                let _ = writeln!(output, "{}:", relative.display());
                for (number, text) in lines {
                    let _ = writeln!(output, "  {number}: {}", text.trim_end());
                }
                output.push('\n');
            }
        }
    }

    debug!(pattern, query, matched_files, "search completed");

    if matched_files == 0 {
        Ok("No matches found".to_owned())
    } else {
        Ok(output.trim_end().to_owned())
    }
}

/// Scan one file for the query, returning up to `max_lines` matches with
/// 1-based line numbers. `None` when the file has no matches or cannot be
/// read as text.
fn scan_file(
    path: &Path,
    query_lower: &str,
    max_lines: usize,
    deadline: Instant,
) -> Option<Vec<(usize, String)>> {
    let content = std::fs::read_to_string(path).ok()?;
    let mut matches = Vec::new();

    for (index, line) in content.lines().enumerate() {
        if matches.len() >= max_lines || Instant::now() >= deadline {
            break;
        }
        if line.to_lowercase().contains(query_lower) {
            matches.push((index + 1, line.to_owned()));
        }
    }

    if matches.is_empty() {
        None
    } else {
        Some(matches)
    }
}
