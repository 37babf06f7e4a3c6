//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the
//! orchestrator from whatever front end is watching it. The sink is passed to
//! each run explicitly; there is no process-wide channel.

use crate::error::EngineError;
use crate::model::{Category, CensusRecord, CopyOutcome, LogStatus, Phase, RunState, TransferResult};

/// Trait for receiving progress updates from a transfer run.
///
/// Every method has an empty default, so implementors only override the
/// events they care about. All methods are called synchronously on the
/// orchestrator's thread.
pub trait ProgressCallback {
    /// Called on every state machine transition.
    fn on_state_changed(&self, _state: RunState) {}

    /// Called after a category has been counted.
    fn on_census(&self, _category: Category, _phase: Phase, _record: &CensusRecord) {}

    /// Called just before the copy tool is launched for a category.
    fn on_copy_started(&self, _category: Category) {}

    fn on_copy_completed(&self, _outcome: &CopyOutcome) {}

    fn on_log_checked(&self, _status: &LogStatus) {}

    /// Called once the run has reached `Done`.
    fn on_run_completed(&self, _result: &TransferResult) {}

    /// Called when the run stops in `Aborted`.
    fn on_run_aborted(&self, _error: &EngineError) {}
}

/// Progress sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {}
