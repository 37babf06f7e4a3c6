//! Error types for the transfer engine.
//!
//! The primary error type is `EngineError`, which represents run-level errors
//! that stop a transfer from being executed or finished. Category-level problems
//! (a failed copy, a count mismatch, an incomplete log) are recorded in the
//! `CategoryResult`, not as EngineError.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{Category, RunId};

/// Errors that can occur at the run level.
///
/// Only configuration problems, missing sources and destinations that vanish
/// during the copy abort a run outright; everything else is accumulated into
/// the run's result and surfaced in the report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Settings file is absent
    #[error("Configuration file not found: {}", path.display())]
    ConfigurationMissing { path: PathBuf },

    /// Settings file exists but could not be read
    #[error("Failed to read configuration file: {}", path.display())]
    ConfigurationUnreadable { path: PathBuf, source: io::Error },

    /// Settings file is not valid TOML or does not match the expected shape
    #[error("Invalid configuration file {}: {source}", path.display())]
    ConfigurationInvalid {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A setting required by the selected platform or mode is absent
    #[error("Required setting `{key}` is missing from the configuration")]
    SettingMissing { key: String },

    /// Host operating system is not one of the supported targets
    #[error("Operating system '{name}' is unknown or not currently supported")]
    UnsupportedPlatform { name: String },

    #[error("Invalid run identifier '{value}': {reason}")]
    InvalidRunId { value: String, reason: String },

    #[error("Unknown copy type '{value}'. Must be 'raw_data', 'analysis' or 'output'")]
    UnknownCategory { value: String },

    #[error("No copy types selected for transfer")]
    EmptyCopySet,

    /// A selected category's source directory does not exist
    #[error("{}", source_not_found_message(*category, path, run_id))]
    SourceNotFound {
        category: Category,
        path: PathBuf,
        run_id: RunId,
    },

    /// Directory handed to the census does not exist
    #[error("Directory to count not found: {}", path.display())]
    CensusRootNotFound { path: PathBuf },

    /// Directory tree could not be walked
    #[error("Failed to count directory tree at {}: {source}", path.display())]
    CensusFailed { path: PathBuf, source: io::Error },

    /// Failed to create a destination directory
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// A category's destination is still absent after its copy attempt
    #[error(
        "Error: {} folder not found for run: {}. Looks like copy failed. \
         Simply restart the command with the same arguments to resume copy from where it left off.",
        category.title(),
        path.display()
    )]
    DestinationMissingPostCopy { category: Category, path: PathBuf },

    /// A copy tool's log file could not be opened or read
    #[error("Failed to read log file {}: {source}", path.display())]
    LogUnreadable { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// Returns true if the run stopped after transfer work had begun.
    ///
    /// Such aborts are worth notifying about; aborts during validation are not,
    /// since nothing was touched.
    pub fn aborted_mid_transfer(&self) -> bool {
        matches!(
            self,
            Self::CensusFailed { .. }
                | Self::CensusRootNotFound { .. }
                | Self::DirectoryCreationFailed { .. }
                | Self::DestinationMissingPostCopy { .. }
        )
    }
}

fn source_not_found_message(category: Category, path: &Path, run_id: &RunId) -> String {
    format!(
        "Error: {title} folder not found for run: {path}. If the folder exists elsewhere, \
         i.e., on the external hard disk, use the option --disk and specify which folder(s) \
         you need to copy from that location using the option --copy-type.\n\n\
         To copy raw_data from the analysis computer:\n\n    \
         run-archiver {run} --copy-type raw_data\n\n\
         To copy analysis and output from the external hard disk:\n\n    \
         run-archiver {run} --copy-type analysis output --disk\n",
        title = category.title(),
        path = path.display(),
        run = run_id,
    )
}
