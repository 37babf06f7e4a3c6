//! Filesystem operations module.
//!
//! This module provides the small set of filesystem side effects the
//! orchestrator performs itself:
//! - Creating destination directories recursively and idempotently
//! - Reading a copy tool's log file
//!
//! Nothing here ever removes or truncates an existing destination; the copy
//! tool's restart semantics depend on finding previous work intact.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::EngineError;

/// Ensure a directory exists, creating it and any missing parents.
///
/// Returns `true` if the directory was created, `false` if it already existed.
///
/// # Errors
/// Returns EngineError if the path exists but is not a directory, or if
/// creation fails.
pub fn ensure_dir_exists(path: &Path) -> Result<bool, EngineError> {
    match fs::metadata(path) {
        Ok(metadata) => {
            if metadata.is_dir() {
                Ok(false)
            } else {
                Err(EngineError::DirectoryCreationFailed {
                    path: path.to_path_buf(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "Path exists but is not a directory",
                    ),
                })
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            info!(path = %path.display(), "created destination folder");
            Ok(true)
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Read a copy tool's log file as lines.
///
/// Robocopy may write logs in the system code page, so invalid UTF-8 is
/// replaced rather than rejected; the markers checked are plain ASCII.
pub fn read_log_lines(path: &Path) -> Result<Vec<String>, EngineError> {
    let bytes = fs::read(path).map_err(|e| EngineError::LogUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect())
}
