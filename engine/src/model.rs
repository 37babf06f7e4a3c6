//! Core data model for run transfers.
//!
//! This module defines the data carried through a transfer:
//! - RunId, Category, CopySet: what is being transferred
//! - PathSet: where each category is read from and written to
//! - CensusRecord, CopyOutcome, LogStatus: what was observed per category
//! - CategoryResult, TransferResult: the aggregate handed to reporting
//! - RunState: the orchestrator's position in the transfer sequence

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Add;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::backend::BackendKind;
use crate::error::EngineError;

/// Name of one acquisition run, used verbatim to build paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Validate and wrap a run name.
    ///
    /// The name becomes a single path component on both volumes, so it must be
    /// non-empty and must not contain separators or be a relative component.
    pub fn new(value: impl Into<String>) -> Result<Self, EngineError> {
        let value = value.into();
        let reason = if value.trim().is_empty() {
            Some("run identifier is empty")
        } else if value.contains('/') || value.contains('\\') {
            Some("run identifier must not contain path separators")
        } else if value == "." || value == ".." {
            Some("run identifier must not be a relative path component")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(EngineError::InvalidRunId {
                value,
                reason: reason.to_string(),
            }),
            None => Ok(RunId(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the three data kinds transferred independently within a run.
///
/// Declaration order is the canonical processing and report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    RawData,
    Analysis,
    Output,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::RawData, Category::Analysis, Category::Output];

    /// Identifier used on the command line, in destination paths and log names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::RawData => "raw_data",
            Category::Analysis => "analysis",
            Category::Output => "output",
        }
    }

    /// Directory under the source root that holds this category's runs.
    pub fn source_subdir(&self) -> &'static str {
        match self {
            Category::RawData => "merfish_raw_data",
            Category::Analysis => "merfish_analysis",
            Category::Output => "merfish_output",
        }
    }

    /// Directory under `{destination_root}/{run}` that receives this category.
    pub fn destination_subdir(&self) -> &'static str {
        self.as_str()
    }

    /// Label used in reports and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Category::RawData => "Raw directory",
            Category::Analysis => "Analysis directory",
            Category::Output => "Output directory",
        }
    }

    /// Title used for the per-category summary table.
    pub fn title(&self) -> &'static str {
        match self {
            Category::RawData => "Raw Data",
            Category::Analysis => "Analysis",
            Category::Output => "Output",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw_data" => Ok(Category::RawData),
            "analysis" => Ok(Category::Analysis),
            "output" => Ok(Category::Output),
            _ => Err(EngineError::UnknownCategory {
                value: s.to_string(),
            }),
        }
    }
}

/// Non-empty set of categories selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySet(BTreeSet<Category>);

impl CopySet {
    pub fn new<I: IntoIterator<Item = Category>>(categories: I) -> Result<Self, EngineError> {
        let set: BTreeSet<Category> = categories.into_iter().collect();
        if set.is_empty() {
            return Err(EngineError::EmptyCopySet);
        }
        Ok(CopySet(set))
    }

    /// All three categories.
    pub fn all() -> Self {
        CopySet(Category::ALL.into_iter().collect())
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    /// Categories in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// When a census was taken relative to the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => write!(f, "Before"),
            Phase::After => write!(f, "After"),
        }
    }
}

/// Paths used for one category of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    /// `{source_root}/{category source subdir}/{run}`
    pub source: PathBuf,
    /// `{destination_root}/{run}/{category}`
    pub destination: PathBuf,
    /// `{destination_root}/{run}/{category}.log`
    pub log: PathBuf,
    /// `{destination_root}/{run}`
    pub destination_parent: PathBuf,
}

/// Counts of files, folders and bytes under a directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CensusRecord {
    pub files: u64,
    pub folders: u64,
    pub bytes: u64,
}

impl CensusRecord {
    pub fn new(files: u64, folders: u64, bytes: u64) -> Self {
        CensusRecord {
            files,
            folders,
            bytes,
        }
    }
}

impl Add for CensusRecord {
    type Output = CensusRecord;

    fn add(self, other: CensusRecord) -> CensusRecord {
        CensusRecord {
            files: self.files + other.files,
            folders: self.folders + other.folders,
            bytes: self.bytes + other.bytes,
        }
    }
}

impl std::iter::Sum for CensusRecord {
    fn sum<I: Iterator<Item = CensusRecord>>(iter: I) -> Self {
        iter.fold(CensusRecord::default(), Add::add)
    }
}

impl fmt::Display for CensusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total files: {}, Total folders: {}, Total size (bytes): {}",
            self.files, self.folders, self.bytes
        )
    }
}

/// How a copy tool's exit status is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Tool completed with nothing to report
    Success,
    /// Tool completed; extras or mismatches were present but nothing failed
    PartialSuccess,
    /// Tool reported a failure or could not be run
    Failure,
}

impl Classification {
    pub fn is_failure(&self) -> bool {
        matches!(self, Classification::Failure)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Success => write!(f, "Success"),
            Classification::PartialSuccess => write!(f, "PartialSuccess"),
            Classification::Failure => write!(f, "Failure"),
        }
    }
}

/// Result of one copy tool invocation for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub category: Category,
    /// `None` when the tool could not be launched or was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub classification: Classification,
    pub message: String,
}

/// Structural completeness of a copy tool's log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStatus {
    pub category: Category,
    pub valid: bool,
    pub reason: String,
}

/// Everything observed for one category during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResult {
    pub paths: PathSet,
    pub before: CensusRecord,
    pub after: CensusRecord,
    pub outcome: CopyOutcome,
    pub log: LogStatus,
}

impl CategoryResult {
    pub fn counts_match(&self) -> bool {
        self.before == self.after
    }

    /// True if this category has no mismatch, copy failure or incomplete log.
    pub fn succeeded(&self) -> bool {
        self.counts_match() && !self.outcome.classification.is_failure() && self.log.valid
    }
}

/// Terminal aggregate of a run that reached reporting.
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// Unique identifier for this invocation
    pub id: Uuid,
    pub run_id: RunId,
    pub backend: BackendKind,
    /// Command line that produced this run, for audit
    pub invocation: String,
    pub categories: BTreeMap<Category, CategoryResult>,
    pub overall_succeeded: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl TransferResult {
    pub fn any_log_invalid(&self) -> bool {
        self.categories.values().any(|c| !c.log.valid)
    }

    pub fn mismatched(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories
            .iter()
            .filter(|(_, c)| !c.counts_match())
            .map(|(category, _)| *category)
    }
}

/// Position of the orchestrator in the transfer sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Validating,
    Counting(Phase),
    Preparing,
    Copying,
    Verifying,
    ValidatingLogs,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Validating => write!(f, "Validating"),
            RunState::Counting(phase) => write!(f, "Counting({})", phase),
            RunState::Preparing => write!(f, "Preparing"),
            RunState::Copying => write!(f, "Copying"),
            RunState::Verifying => write!(f, "Verifying"),
            RunState::ValidatingLogs => write!(f, "ValidatingLogs"),
            RunState::Reporting => write!(f, "Reporting"),
            RunState::Done => write!(f, "Done"),
            RunState::Aborted => write!(f, "Aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_rejects_separators_and_empty() {
        assert!(RunId::new("202310261058_VZGEN1_VMSC10202").is_ok());
        assert!(RunId::new("").is_err());
        assert!(RunId::new("   ").is_err());
        assert!(RunId::new("a/b").is_err());
        assert!(RunId::new("a\\b").is_err());
        assert!(RunId::new("..").is_err());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("raw_data".parse::<Category>().unwrap(), Category::RawData);
        assert_eq!(" Analysis ".parse::<Category>().unwrap(), Category::Analysis);
        assert_eq!("OUTPUT".parse::<Category>().unwrap(), Category::Output);
        assert!("rawdata".parse::<Category>().is_err());
    }

    #[test]
    fn test_copy_set_is_ordered_and_deduplicated() {
        let set = CopySet::new([Category::Output, Category::RawData, Category::Output])
            .expect("non-empty set");
        let ordered: Vec<_> = set.iter().collect();
        assert_eq!(ordered, vec![Category::RawData, Category::Output]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_copy_set_rejects_empty() {
        let result = CopySet::new(Vec::new());
        assert!(matches!(result, Err(EngineError::EmptyCopySet)));
    }

    #[test]
    fn test_census_record_sum() {
        let total: CensusRecord = vec![
            CensusRecord::new(1, 2, 3),
            CensusRecord::new(4, 5, 6),
            CensusRecord::default(),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, CensusRecord::new(5, 7, 9));
    }

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Counting(Phase::After).to_string(), "Counting(After)");
    }
}
