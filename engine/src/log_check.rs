//! Completeness checks for copy tool log files.
//!
//! Robocopy writes a banner near the top of its log and a summary table near
//! the bottom; a log missing either was cut short. The checks are positional
//! line matches, kept behind [`LogValidator`] so a structured parser can
//! replace them without touching the orchestrator.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{Category, LogStatus};

/// Banner robocopy writes on the third line of its log.
pub const ROBOCOPY_HEADER: &str = "ROBOCOPY     ::     Robust File Copy for Windows";

/// Column headings of robocopy's closing summary table.
pub const ROBOCOPY_FOOTER: &str = "Total    Copied   Skipped  Mismatch    FAILED    Extras";

pub const COMPLETE_LOG: &str = "Complete log file";

pub const INCOMPLETE_LOG: &str =
    "NOT A COMPLETE LOG FILE. PLEASE RE-RUN THE COMMAND TO GET A COMPLETE LOG FILE.";

/// Inspects a copy tool's log for structural completeness.
pub trait LogValidator {
    /// # Errors
    /// Returns `LogUnreadable` if the log cannot be read.
    fn validate(&self, category: Category, log_path: &Path) -> Result<LogStatus, EngineError>;
}

/// Checks the robocopy header and footer markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RobocopyLogValidator;

impl LogValidator for RobocopyLogValidator {
    fn validate(&self, category: Category, log_path: &Path) -> Result<LogStatus, EngineError> {
        let lines = fs_ops::read_log_lines(log_path)?;
        let header = header_present(&lines);
        let footer = footer_present(&lines);
        debug!(
            %category,
            log = %log_path.display(),
            header,
            footer,
            "checked robocopy log markers"
        );

        let valid = header && footer;
        if !valid {
            warn!(%category, log = %log_path.display(), "{}", INCOMPLETE_LOG);
        }
        Ok(status(category, valid))
    }
}

/// Rsync logs carry no completeness markers and are accepted as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsyncLogValidator;

impl LogValidator for RsyncLogValidator {
    fn validate(&self, category: Category, _log_path: &Path) -> Result<LogStatus, EngineError> {
        Ok(status(category, true))
    }
}

fn status(category: Category, valid: bool) -> LogStatus {
    LogStatus {
        category,
        valid,
        reason: if valid { COMPLETE_LOG } else { INCOMPLETE_LOG }.to_string(),
    }
}

/// Header must be on line 3 of a log longer than three lines.
fn header_present(lines: &[String]) -> bool {
    lines.len() > 3 && lines[2].trim().contains(ROBOCOPY_HEADER)
}

/// Footer is on the 11th line from the end, or the 7th when robocopy omits the
/// speed lines.
fn footer_present(lines: &[String]) -> bool {
    let from_end =
        |n: usize| lines.len() > n && lines[lines.len() - n].trim().contains(ROBOCOPY_FOOTER);
    from_end(11) || from_end(7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// Build a robocopy-like log with the footer `footer_from_end` lines from
    /// the bottom, or without a footer when `None`.
    fn robocopy_log(with_header: bool, footer_from_end: Option<usize>) -> String {
        let mut lines = vec![
            String::new(),
            "-------------------------------------------------------------------------------".to_string(),
            if with_header {
                format!("   {}", ROBOCOPY_HEADER)
            } else {
                "   Some other tool".to_string()
            },
            "-------------------------------------------------------------------------------".to_string(),
            "  Started : Thursday, 26 October 2023 10:58:00".to_string(),
            "   Source : Z:\\merfish_raw_data\\RUN\\".to_string(),
            "     Dest : F:\\RUN\\raw_data\\".to_string(),
            "	                   1	Z:\\merfish_raw_data\\RUN\\".to_string(),
            "	    New File  		     500	data.bin".to_string(),
            "-------------------------------------------------------------------------------".to_string(),
        ];
        if let Some(n) = footer_from_end {
            lines.push(format!("               {}", ROBOCOPY_FOOTER));
            for i in 1..n {
                lines.push(format!("    summary line {}", i));
            }
        }
        let mut text = lines.join("\r\n");
        text.push_str("\r\n");
        text
    }

    fn write_log(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("raw_data.log");
        fs::write(&path, content).expect("Failed to write log");
        path
    }

    #[test]
    fn test_robocopy_log_footer_eleven_from_end_is_valid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &robocopy_log(true, Some(11)));

        let status = RobocopyLogValidator
            .validate(Category::RawData, &path)
            .expect("log should be readable");
        assert!(status.valid);
        assert_eq!(status.reason, COMPLETE_LOG);
    }

    #[test]
    fn test_robocopy_log_footer_seven_from_end_is_valid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &robocopy_log(true, Some(7)));

        let status = RobocopyLogValidator
            .validate(Category::RawData, &path)
            .expect("log should be readable");
        assert!(status.valid);
    }

    #[test]
    fn test_robocopy_log_footer_elsewhere_is_invalid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &robocopy_log(true, Some(9)));

        let status = RobocopyLogValidator
            .validate(Category::RawData, &path)
            .expect("log should be readable");
        assert!(!status.valid);
    }

    #[test]
    fn test_robocopy_log_without_markers_asks_for_rerun() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &robocopy_log(false, None));

        let status = RobocopyLogValidator
            .validate(Category::Analysis, &path)
            .expect("log should be readable");
        assert!(!status.valid);
        assert_eq!(status.category, Category::Analysis);
        assert!(status.reason.contains("PLEASE RE-RUN THE COMMAND"));
    }

    #[test]
    fn test_robocopy_log_missing_header_only_is_invalid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &robocopy_log(false, Some(11)));

        let status = RobocopyLogValidator
            .validate(Category::RawData, &path)
            .expect("log should be readable");
        assert!(!status.valid);
    }

    #[test]
    fn test_robocopy_short_log_is_invalid() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), &format!("\n\n{}\n", ROBOCOPY_HEADER));

        let status = RobocopyLogValidator
            .validate(Category::RawData, &path)
            .expect("log should be readable");
        assert!(!status.valid);
    }

    #[test]
    fn test_robocopy_missing_log_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result =
            RobocopyLogValidator.validate(Category::Output, &temp_dir.path().join("output.log"));
        assert!(matches!(result, Err(EngineError::LogUnreadable { .. })));
    }

    #[test]
    fn test_rsync_log_is_always_complete() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_log(temp_dir.path(), "");

        let status = RsyncLogValidator
            .validate(Category::Output, &path)
            .expect("rsync validation never fails");
        assert!(status.valid);
        assert_eq!(status.reason, COMPLETE_LOG);
    }
}
