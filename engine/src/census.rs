//! Recursive file, folder and byte counts for a directory tree.
//!
//! The root's immediate entries are counted in parallel, one worker per
//! subdirectory, and the partial counts are summed. Addition is commutative, so
//! the totals do not depend on traversal order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::model::CensusRecord;
use crate::platform;

/// Count every folder, every regular file and the total file bytes under `root`.
///
/// The root itself is not counted as a folder.
///
/// # Errors
/// Returns `CensusRootNotFound` if `root` does not exist and `CensusFailed` if
/// any part of the tree cannot be read.
pub fn census(root: &Path) -> Result<CensusRecord, EngineError> {
    match fs::metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::CensusRootNotFound {
                path: root.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(EngineError::CensusFailed {
                path: root.to_path_buf(),
                source: e,
            });
        }
    }

    let walk_root = platform::extended_path(root);
    let entries: Vec<PathBuf> = fs::read_dir(&walk_root)
        .and_then(|entries| {
            entries
                .map(|e| e.map(|e| e.path()))
                .collect::<io::Result<Vec<PathBuf>>>()
        })
        .map_err(|e| EngineError::CensusFailed {
            path: root.to_path_buf(),
            source: e,
        })?;

    let partials = entries
        .par_iter()
        .map(|entry| census_subtree(entry))
        .collect::<Result<Vec<CensusRecord>, EngineError>>()?;

    let total: CensusRecord = partials.into_iter().sum();
    debug!(root = %root.display(), %total, "census complete");
    Ok(total)
}

/// Count `entry` and, if it is a directory, everything beneath it.
fn census_subtree(entry: &Path) -> Result<CensusRecord, EngineError> {
    let mut record = CensusRecord::default();

    for item in WalkDir::new(entry).follow_root_links(false) {
        let item = item.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| entry.to_path_buf());
            EngineError::CensusFailed {
                path,
                source: e.into(),
            }
        })?;

        let file_type = item.file_type();
        if file_type.is_dir() {
            record.folders += 1;
        } else if file_type.is_file() {
            let metadata = item.metadata().map_err(|e| EngineError::CensusFailed {
                path: item.path().to_path_buf(),
                source: e.into(),
            })?;
            record.files += 1;
            record.bytes += metadata.len();
        } else if file_type.is_symlink() {
            // Links are not followed; they count as what they point at.
            match fs::metadata(item.path()) {
                Ok(target) if target.is_dir() => record.folders += 1,
                Ok(target) => {
                    record.files += 1;
                    record.bytes += target.len();
                }
                Err(e) => {
                    warn!(path = %item.path().display(), error = %e, "skipping dangling link");
                }
            }
        }
    }

    Ok(record)
}
