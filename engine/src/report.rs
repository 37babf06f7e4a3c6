//! Plain-text transfer reports.
//!
//! A report is a pure rendering of a [`TransferResult`]: the same result always
//! produces the same text. Sections, in order:
//! - heading, transfer id and timing
//! - data locations
//! - per-category before/after count tables, with a mismatch warning when the
//!   counts differ
//! - copy tool exit code messages, with the platform's reading of exit codes
//! - log file status
//! - the command that produced the run

use std::fmt::Write;

use crate::error::EngineError;
use crate::model::{RunId, TransferResult};

const LABEL_WIDTH: usize = 16;
const COLUMN_WIDTH: usize = 18;
const RULE_WIDTH: usize = LABEL_WIDTH + COLUMN_WIDTH * 3;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A rendered report ready for a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub body: String,
    /// True when the report is framed as a failure
    pub failed: bool,
}

fn heading(run_id: &RunId, failed: bool) -> String {
    let verb = if failed { "failed" } else { "completed" };
    format!("Data transfer {} for run: {}", verb, run_id)
}

fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}h {}m {}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Render the report for a run that reached `Reporting`.
///
/// The report is framed as failed when the run did not verify or when any
/// copy log is incomplete.
pub fn build(result: &TransferResult) -> Report {
    let failed = !result.overall_succeeded || result.any_log_invalid();
    let subject = heading(&result.run_id, failed);
    let rule = "-".repeat(RULE_WIDTH);

    // Writing to a String cannot fail, so the fmt::Results below are ignored.
    let mut body = subject.clone();

    let _ = write!(
        body,
        "\n\nTransfer ID: {}\nStarted: {}\nFinished: {}\nElapsed: {}",
        result.id,
        result.started_at.format(TIMESTAMP_FORMAT),
        result.finished_at.format(TIMESTAMP_FORMAT),
        format_elapsed((result.finished_at - result.started_at).num_seconds())
    );

    body.push_str("\n\nData location(s):\n");
    for (category, cat) in &result.categories {
        let _ = write!(body, "\n - {}: {}", category.label(), cat.paths.destination.display());
    }

    body.push_str("\n\nData summary:\n");
    for (category, cat) in &result.categories {
        let _ = writeln!(body, "\n{} Transfer Summary", category.title());
        let _ = writeln!(body, "{}", rule);
        let _ = writeln!(
            body,
            "{:<lw$}{:<cw$}{:<cw$}{:<cw$}",
            "Status",
            "Total Files",
            "Total Folders",
            "Total Size (Bytes)",
            lw = LABEL_WIDTH,
            cw = COLUMN_WIDTH
        );
        let _ = writeln!(body, "{}", rule);
        for (label, record) in [("Before Transfer", &cat.before), ("After Transfer", &cat.after)] {
            let _ = writeln!(
                body,
                "{:<lw$}{:<cw$}{:<cw$}{:<cw$}",
                label,
                record.files,
                record.folders,
                record.bytes,
                lw = LABEL_WIDTH,
                cw = COLUMN_WIDTH
            );
        }
        let _ = writeln!(body, "{}", rule);

        if !cat.counts_match() {
            let _ = writeln!(
                body,
                "ERROR: Mismatch detected in {} counts between before and after transfer.\n\
                 Please try re-running the transfer command.",
                category
            );
        }
    }

    body.push_str("\n\nExit code(s):\n");
    let _ = writeln!(body, "\nNote: {}", result.backend.platform_note());
    for (category, cat) in &result.categories {
        let _ = write!(body, "\n - {}: {}", category.label(), cat.outcome.message);
        let stderr = cat.outcome.stderr.trim();
        if cat.outcome.classification.is_failure() && !stderr.is_empty() {
            let _ = write!(body, "\n   STDERR: {}", stderr);
        }
    }

    body.push_str("\n\nLog file status:\n");
    for (category, cat) in &result.categories {
        let _ = write!(body, "\n - {}: {}", category.label(), cat.log.reason);
    }

    let _ = write!(body, "\n\nCommand executed:\n\n{}", result.invocation);

    Report {
        subject,
        body,
        failed,
    }
}

/// Render the notice sent when a run aborts after transfer work has begun.
pub fn abort_notice(run_id: &RunId, error: &EngineError, invocation: &str) -> Report {
    let subject = heading(run_id, true);
    let body = format!(
        "{}\n\n{}\n\nCommand executed:\n\n{}",
        subject, error, invocation
    );
    Report {
        subject,
        body,
        failed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::model::{
        Category, CategoryResult, CensusRecord, Classification, CopyOutcome, LogStatus, PathSet,
    };
    use crate::log_check::{COMPLETE_LOG, INCOMPLETE_LOG};
    use chrono::{Local, TimeZone};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn category_result(category: Category, after_files: u64) -> CategoryResult {
        let parent = PathBuf::from("/archive/RUN");
        CategoryResult {
            paths: PathSet {
                source: PathBuf::from("/data").join(category.source_subdir()).join("RUN"),
                destination: parent.join(category.as_str()),
                log: parent.join(format!("{}.log", category)),
                destination_parent: parent,
            },
            before: CensusRecord::new(10, 2, 500),
            after: CensusRecord::new(after_files, 2, 500),
            outcome: CopyOutcome {
                category,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                classification: Classification::Success,
                message: format!(
                    "Copied {} for run: RUN with rsync exit code '0': Success.",
                    category
                ),
            },
            log: LogStatus {
                category,
                valid: true,
                reason: COMPLETE_LOG.to_string(),
            },
        }
    }

    fn transfer_result(categories: Vec<CategoryResult>) -> TransferResult {
        let started_at = Local
            .with_ymd_and_hms(2023, 10, 26, 10, 58, 0)
            .single()
            .expect("valid timestamp");
        let finished_at = Local
            .with_ymd_and_hms(2023, 10, 26, 12, 3, 7)
            .single()
            .expect("valid timestamp");
        let categories: BTreeMap<_, _> = categories
            .into_iter()
            .map(|c| (c.outcome.category, c))
            .collect();
        let overall_succeeded = categories.values().all(CategoryResult::succeeded);
        TransferResult {
            id: Uuid::nil(),
            run_id: RunId::new("RUN").expect("valid run id"),
            backend: BackendKind::Rsync,
            invocation: "run-archiver RUN --copy-type raw_data".to_string(),
            categories,
            overall_succeeded,
            started_at,
            finished_at,
        }
    }

    #[test]
    fn test_successful_report_layout() {
        let result = transfer_result(vec![category_result(Category::RawData, 10)]);
        let report = build(&result);

        assert!(!report.failed);
        assert_eq!(report.subject, "Data transfer completed for run: RUN");
        assert!(report.body.contains(" - Raw directory: /archive/RUN/raw_data"));
        assert!(report.body.contains("Raw Data Transfer Summary"));
        assert!(report.body.contains(&format!(
            "{:<16}{:<18}{:<18}{:<18}",
            "Before Transfer", 10, 2, 500
        )));
        assert!(report.body.contains("Any non-zero exit code"));
        assert!(report.body.contains(" - Raw directory: Complete log file"));
        assert!(report
            .body
            .ends_with("Command executed:\n\nrun-archiver RUN --copy-type raw_data"));
        assert!(!report.body.contains("Mismatch"));
        assert!(report.body.contains(&format!("Transfer ID: {}", Uuid::nil())));
        assert!(report.body.contains("Started: 2023-10-26 10:58:00"));
        assert!(report.body.contains("Finished: 2023-10-26 12:03:07"));
        assert!(report.body.contains("Elapsed: 1h 5m 7s"));

        let locations = report.body.find("Data location(s):").expect("locations");
        let summary = report.body.find("Data summary:").expect("summary");
        let exits = report.body.find("Exit code(s):").expect("exit codes");
        let logs = report.body.find("Log file status:").expect("log status");
        assert!(locations < summary && summary < exits && exits < logs);
    }

    #[test]
    fn test_mismatch_fails_report() {
        let result = transfer_result(vec![
            category_result(Category::RawData, 9),
            category_result(Category::Output, 10),
        ]);
        let report = build(&result);

        assert!(report.failed);
        assert_eq!(report.subject, "Data transfer failed for run: RUN");
        assert!(report.body.contains(
            "ERROR: Mismatch detected in raw_data counts between before and after transfer."
        ));
        assert!(!report.body.contains("Mismatch detected in output"));
    }

    #[test]
    fn test_incomplete_log_fails_report() {
        let mut cat = category_result(Category::Analysis, 10);
        cat.log.valid = false;
        cat.log.reason = INCOMPLETE_LOG.to_string();
        let report = build(&transfer_result(vec![cat]));

        assert!(report.failed);
        assert!(report.body.contains("Analysis directory: NOT A COMPLETE LOG FILE"));
    }

    #[test]
    fn test_invalid_log_alone_fails_report() {
        let mut cat = category_result(Category::Analysis, 10);
        cat.log.valid = false;
        cat.log.reason = INCOMPLETE_LOG.to_string();
        let mut result = transfer_result(vec![category_result(Category::RawData, 10), cat]);
        // Framing must not depend on the caller folding log status into the verdict
        result.overall_succeeded = true;

        let report = build(&result);
        assert!(report.failed);
        assert_eq!(report.subject, "Data transfer failed for run: RUN");
    }

    #[test]
    fn test_copy_failure_fails_report_and_shows_stderr() {
        let mut cat = category_result(Category::Output, 10);
        cat.outcome.exit_code = Some(16);
        cat.outcome.classification = Classification::Failure;
        cat.outcome.stderr = "ERROR 5 (0x00000005) Access is denied.\n".to_string();
        cat.outcome.message =
            "Error copying output for run: RUN with robocopy exit code '16'".to_string();
        let report = build(&transfer_result(vec![cat]));

        assert!(report.failed);
        assert!(report.body.contains("exit code '16'"));
        assert!(report.body.contains("STDERR: ERROR 5 (0x00000005) Access is denied."));
    }

    #[test]
    fn test_build_is_deterministic() {
        let result = transfer_result(vec![
            category_result(Category::Output, 10),
            category_result(Category::RawData, 10),
        ]);
        assert_eq!(build(&result), build(&result));

        let body = build(&result).body;
        let raw = body.find("Raw Data Transfer").expect("raw");
        let output = body.find("Output Transfer").expect("output");
        assert!(raw < output);
    }

    #[test]
    fn test_abort_notice() {
        let err = EngineError::DestinationMissingPostCopy {
            category: Category::Analysis,
            path: PathBuf::from("/archive/RUN/analysis"),
        };
        let run_id = RunId::new("RUN").expect("valid run id");
        let report = abort_notice(&run_id, &err, "run-archiver RUN");

        assert!(report.failed);
        assert_eq!(report.subject, "Data transfer failed for run: RUN");
        assert!(report.body.contains("resume copy from where it left off"));
        assert!(report.body.ends_with("run-archiver RUN"));
    }
}
