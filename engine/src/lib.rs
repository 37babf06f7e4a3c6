//! # Run Archiver Engine - Verified Run Transfer Library
//!
//! A headless engine that moves instrument run data from an acquisition volume
//! to an archival volume with an external, restartable copy tool, then proves
//! the copy: tree counts before and after, the tool's exit code, and the
//! completeness of the tool's own log.
//!
//! ## Overview
//!
//! Each run is split into up to three categories (raw data, analysis, output)
//! that are copied and verified independently. The engine features:
//! - Canonical source, destination and log paths per category
//! - Parallel file, folder and byte census of directory trees
//! - Robocopy (Windows) and rsync (Linux) backends with table-driven exit codes
//! - Log completeness checks
//! - A plain-text report handed to a pluggable notifier
//! - Progress reporting via callbacks (decoupled from any front end)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use archiver_engine::{
//!     load_settings, CopySet, Platform, RunId, RunRequest, SourceSelection,
//!     TracingNotifier, TransferOrchestrator,
//! };
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = load_settings(Path::new(".run_archiver.toml"))?;
//! let platform = Platform::detect()?;
//! let profile = settings.drive_profile(platform, SourceSelection::default())?;
//!
//! let request = RunRequest::new(RunId::new("202310261058_VZGEN1_VMSC10202")?, CopySet::all());
//! let orchestrator =
//!     TransferOrchestrator::new(request, profile, platform.backend(), Box::new(TracingNotifier));
//!
//! let result = orchestrator.run(None)?;
//! println!("verified: {}", result.overall_succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (RunId, Category, CensusRecord, TransferResult)
//! - **error**: Error types and handling
//! - **config**: Settings file and drive profiles
//! - **platform**: Supported operating systems and backend selection
//! - **paths**: Source, destination and log path layout
//! - **census**: Directory tree counts
//! - **fs_ops**: Low-level filesystem operations
//! - **backend**: Copy tool invocation and exit code classification
//! - **log_check**: Copy tool log validation
//! - **orchestrator**: The run state machine
//! - **report**: Report rendering
//! - **notify**: Report delivery
//! - **progress**: Progress callback trait

pub mod backend;
pub mod census;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod log_check;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod paths;
pub mod platform;
pub mod progress;
pub mod report;

// Re-export main types and functions
pub use backend::{BackendKind, CopyBackend, CopyRequest, RobocopyBackend, RsyncBackend};
pub use census::census;
pub use config::{load_settings, DriveProfile, Settings, SourceSelection, DEFAULT_CONFIG_FILE};
pub use error::EngineError;
pub use log_check::{LogValidator, RobocopyLogValidator, RsyncLogValidator};
pub use model::{
    Category, CategoryResult, CensusRecord, Classification, CopyOutcome, CopySet, LogStatus,
    PathSet, Phase, RunId, RunState, TransferResult,
};
pub use notify::{Notifier, NotifyError, SmtpNotifier, TracingNotifier};
pub use orchestrator::{RunRequest, TransferOrchestrator, DEFAULT_THREADS};
pub use platform::Platform;
pub use progress::ProgressCallback;
pub use report::Report;
