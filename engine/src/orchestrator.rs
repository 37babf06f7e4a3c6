//! Transfer orchestration.
//!
//! A run moves through a fixed sequence of states:
//!
//! `Validating → Counting(Before) → Preparing → Copying → Verifying →
//! Counting(After) → ValidatingLogs → Reporting → Done`
//!
//! and stops in `Aborted` when a missing source, a failed census, a failed
//! directory creation or a destination that is still missing after its copy
//! makes continuing pointless. Categories are processed one after another
//! within each state. A failed copy, a count mismatch or an incomplete log does
//! not abort the run; it is recorded on the category and turns the report into
//! a failure report.
//!
//! Nothing here deletes or truncates destination data, so re-running an
//! aborted or failed run with the same inputs resumes where the copy tool left
//! off.

use std::collections::BTreeMap;

use chrono::Local;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::{CopyBackend, CopyRequest};
use crate::census::census;
use crate::config::DriveProfile;
use crate::error::EngineError;
use crate::fs_ops::ensure_dir_exists;
use crate::model::{
    Category, CategoryResult, CensusRecord, CopyOutcome, CopySet, LogStatus, PathSet, Phase,
    RunId, RunState, TransferResult,
};
use crate::notify::Notifier;
use crate::paths;
use crate::progress::{NoProgress, ProgressCallback};
use crate::report::{self, Report};

/// Default number of copy threads handed to tools that support it.
pub const DEFAULT_THREADS: u32 = 8;

/// What to transfer.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: RunId,
    pub copy_set: CopySet,
    pub threads: u32,
    /// Command line that started the run, quoted in reports
    pub invocation: String,
}

impl RunRequest {
    pub fn new(run_id: RunId, copy_set: CopySet) -> Self {
        let invocation = format!("run-archiver {}", run_id);
        RunRequest {
            run_id,
            copy_set,
            threads: DEFAULT_THREADS,
            invocation,
        }
    }
}

/// Drives one run from validation to report delivery.
pub struct TransferOrchestrator {
    request: RunRequest,
    profile: DriveProfile,
    backend: Box<dyn CopyBackend>,
    notifier: Box<dyn Notifier>,
}

impl TransferOrchestrator {
    pub fn new(
        request: RunRequest,
        profile: DriveProfile,
        backend: Box<dyn CopyBackend>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        TransferOrchestrator {
            request,
            profile,
            backend,
            notifier,
        }
    }

    /// Execute the run.
    ///
    /// Returns the result of every run that reaches `Done`, whether or not the
    /// transfer verified; check `overall_succeeded`.
    ///
    /// # Errors
    /// Returns the error that moved the run to `Aborted`. When the abort
    /// happened after transfer work began, a failure notice has already been
    /// handed to the notifier.
    pub fn run(
        &self,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<TransferResult, EngineError> {
        let progress = progress.unwrap_or(&NoProgress);
        let run_id = &self.request.run_id;

        info!(
            run = %run_id,
            platform = %self.profile.platform,
            backend = %self.backend.kind(),
            source_root = %self.profile.source_root.display(),
            destination_root = %self.profile.destination_root.display(),
            "starting transfer"
        );

        match self.execute(progress) {
            Ok(result) => {
                progress.on_run_completed(&result);
                Ok(result)
            }
            Err(e) => {
                self.enter(RunState::Aborted, progress);
                error!(run = %run_id, "{}", e);
                if e.aborted_mid_transfer() {
                    self.send(&report::abort_notice(run_id, &e, &self.request.invocation));
                }
                progress.on_run_aborted(&e);
                Err(e)
            }
        }
    }

    fn execute(&self, progress: &dyn ProgressCallback) -> Result<TransferResult, EngineError> {
        let run_id = &self.request.run_id;
        let started_at = Local::now();
        let paths = paths::resolve(run_id, &self.profile, &self.request.copy_set);

        self.enter(RunState::Validating, progress);
        self.validate_sources(&paths)?;

        self.enter(RunState::Counting(Phase::Before), progress);
        let before = self.count(&paths, Phase::Before, progress)?;

        self.enter(RunState::Preparing, progress);
        for path_set in paths.values() {
            ensure_dir_exists(&path_set.destination)?;
        }

        self.enter(RunState::Copying, progress);
        let mut outcomes = BTreeMap::new();
        for (&category, path_set) in &paths {
            outcomes.insert(category, self.copy(category, path_set, progress));
        }

        self.enter(RunState::Verifying, progress);
        for (&category, path_set) in &paths {
            if !path_set.destination.is_dir() {
                return Err(EngineError::DestinationMissingPostCopy {
                    category,
                    path: path_set.destination.clone(),
                });
            }
        }

        self.enter(RunState::Counting(Phase::After), progress);
        let after = self.count(&paths, Phase::After, progress)?;

        self.enter(RunState::ValidatingLogs, progress);
        let mut logs = BTreeMap::new();
        for (&category, path_set) in &paths {
            let status = self.check_log(category, path_set);
            progress.on_log_checked(&status);
            logs.insert(category, status);
        }

        self.enter(RunState::Reporting, progress);
        // Every map is keyed by the same categories, so their values line up.
        let categories: BTreeMap<Category, CategoryResult> = paths
            .into_iter()
            .zip(before.into_values().zip(after.into_values()))
            .zip(outcomes.into_values().zip(logs.into_values()))
            .map(|(((category, paths), (before, after)), (outcome, log))| {
                let result = CategoryResult {
                    paths,
                    before,
                    after,
                    outcome,
                    log,
                };
                if !result.counts_match() {
                    warn!(
                        run = %run_id,
                        %category,
                        before = %result.before,
                        after = %result.after,
                        "mismatch in counts between before and after transfer"
                    );
                }
                (category, result)
            })
            .collect();

        let overall_succeeded = categories.values().all(CategoryResult::succeeded);
        let result = TransferResult {
            id: Uuid::new_v4(),
            run_id: run_id.clone(),
            backend: self.backend.kind(),
            invocation: self.request.invocation.clone(),
            categories,
            overall_succeeded,
            started_at,
            finished_at: Local::now(),
        };

        self.send(&report::build(&result));

        self.enter(RunState::Done, progress);
        if overall_succeeded {
            info!(run = %run_id, transfer = %result.id, "transfer completed and verified");
        } else {
            warn!(run = %run_id, transfer = %result.id, "transfer completed with errors");
        }
        Ok(result)
    }

    fn enter(&self, state: RunState, progress: &dyn ProgressCallback) {
        info!(run = %self.request.run_id, %state, "entering state");
        progress.on_state_changed(state);
    }

    /// Every selected source must exist before anything is counted or copied.
    fn validate_sources(&self, paths: &BTreeMap<Category, PathSet>) -> Result<(), EngineError> {
        for (&category, path_set) in paths {
            if !path_set.source.is_dir() {
                return Err(EngineError::SourceNotFound {
                    category,
                    path: path_set.source.clone(),
                    run_id: self.request.run_id.clone(),
                });
            }
            info!(
                run = %self.request.run_id,
                %category,
                source = %path_set.source.display(),
                destination = %path_set.destination.display(),
                "source found"
            );
        }
        Ok(())
    }

    fn count(
        &self,
        paths: &BTreeMap<Category, PathSet>,
        phase: Phase,
        progress: &dyn ProgressCallback,
    ) -> Result<BTreeMap<Category, CensusRecord>, EngineError> {
        let mut records = BTreeMap::new();
        for (&category, path_set) in paths {
            let root = match phase {
                Phase::Before => &path_set.source,
                Phase::After => &path_set.destination,
            };
            let record = census(root)?;
            info!(run = %self.request.run_id, %category, %phase, "{}", record);
            progress.on_census(category, phase, &record);
            records.insert(category, record);
        }
        Ok(records)
    }

    fn copy(
        &self,
        category: Category,
        path_set: &PathSet,
        progress: &dyn ProgressCallback,
    ) -> CopyOutcome {
        progress.on_copy_started(category);
        let outcome = self.backend.copy(&CopyRequest {
            run_id: &self.request.run_id,
            category,
            source: &path_set.source,
            destination: &path_set.destination,
            log_path: &path_set.log,
            options: &self.profile.tool_options,
            threads: self.request.threads,
        });
        progress.on_copy_completed(&outcome);
        outcome
    }

    /// An unreadable log is recorded as an incomplete one.
    fn check_log(&self, category: Category, path_set: &PathSet) -> LogStatus {
        let validator = self.backend.kind().log_validator();
        match validator.validate(category, &path_set.log) {
            Ok(status) => status,
            Err(e) => {
                warn!(run = %self.request.run_id, %category, "{}", e);
                LogStatus {
                    category,
                    valid: false,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Notifier failures are logged and never change the run's result.
    fn send(&self, report: &Report) {
        info!(
            run = %self.request.run_id,
            subject = %report.subject,
            failed = report.failed,
            "delivering report"
        );
        if let Err(e) = self.notifier.deliver(&report.subject, &report.body) {
            error!(run = %self.request.run_id, error = %e, "failed to deliver report");
        }
    }
}
