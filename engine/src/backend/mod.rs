//! Copy backends.
//!
//! A backend wraps one external, restartable copy tool. It builds the tool's
//! command line, runs it as a blocking subprocess and classifies the exit code
//! through a fixed table. A non-zero exit code is a normal, classified outcome;
//! only a failure to start the tool at all is reported as a launch fault, and
//! that too is returned as a `Failure` outcome rather than an error.

mod robocopy;
mod rsync;

pub use robocopy::{RobocopyBackend, ROBOCOPY_EXIT_CODES};
pub use rsync::{RsyncBackend, RSYNC_EXIT_CODES};

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::{debug, error, info};

use crate::log_check::{LogValidator, RobocopyLogValidator, RsyncLogValidator};
use crate::model::{Category, Classification, CopyOutcome, RunId};

/// Which copy tool family a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Rsync,
    Robocopy,
}

impl BackendKind {
    pub fn tool_name(&self) -> &'static str {
        match self {
            BackendKind::Rsync => "rsync",
            BackendKind::Robocopy => "robocopy",
        }
    }

    /// How to read the exit codes listed in a report.
    pub fn platform_note(&self) -> &'static str {
        match self {
            BackendKind::Robocopy => {
                "Any exit code value equal to or greater than 8 indicates that there was \
                 at least one failure during the robocopy operation."
            }
            BackendKind::Rsync => {
                "Any non-zero exit code indicates that there was at least one failure \
                 during the rsync copy operation."
            }
        }
    }

    /// Validator for the log files this tool writes.
    pub fn log_validator(&self) -> Box<dyn LogValidator> {
        match self {
            BackendKind::Rsync => Box::new(RsyncLogValidator),
            BackendKind::Robocopy => Box::new(RobocopyLogValidator),
        }
    }

    pub fn exit_codes(&self) -> &'static ExitCodeTable {
        match self {
            BackendKind::Rsync => &RSYNC_EXIT_CODES,
            BackendKind::Robocopy => &ROBOCOPY_EXIT_CODES,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// One row of an exit code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodeEntry {
    pub code: i32,
    pub classification: Classification,
    pub meaning: &'static str,
}

/// Exit code interpretation for one tool. Codes absent from the table are
/// classified as `Failure`.
#[derive(Debug)]
pub struct ExitCodeTable {
    pub entries: &'static [ExitCodeEntry],
    pub unknown_meaning: &'static str,
}

impl ExitCodeTable {
    pub fn lookup(&self, code: i32) -> Option<&ExitCodeEntry> {
        self.entries.iter().find(|entry| entry.code == code)
    }

    pub fn classify(&self, code: i32) -> (Classification, &'static str) {
        match self.lookup(code) {
            Some(entry) => (entry.classification, entry.meaning),
            None => (Classification::Failure, self.unknown_meaning),
        }
    }
}

/// Inputs for one copy tool invocation.
#[derive(Debug, Clone, Copy)]
pub struct CopyRequest<'a> {
    pub run_id: &'a RunId,
    pub category: Category,
    pub source: &'a Path,
    pub destination: &'a Path,
    pub log_path: &'a Path,
    /// Tool options from configuration, passed through verbatim
    pub options: &'a str,
    pub threads: u32,
}

/// An external copy tool.
///
/// Implementors describe how to invoke the tool; the provided `copy` runs it and
/// classifies the result.
pub trait CopyBackend {
    fn kind(&self) -> BackendKind;

    /// Executable to launch.
    fn program(&self) -> &Path;

    /// Arguments for one category's copy.
    fn arguments(&self, request: &CopyRequest<'_>) -> Vec<OsString>;

    /// Run the tool once, blocking until it exits.
    fn copy(&self, request: &CopyRequest<'_>) -> CopyOutcome {
        run_copy_tool(self, request)
    }
}

/// Render a program and its arguments for logs and reports.
pub fn render_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![quote(&program.to_string_lossy())];
    parts.extend(args.iter().map(|a| quote(&a.to_string_lossy())));
    parts.join(" ")
}

fn quote(part: &str) -> String {
    if part.contains(char::is_whitespace) {
        format!("\"{}\"", part)
    } else {
        part.to_string()
    }
}

fn split_options(options: &str) -> impl Iterator<Item = OsString> + '_ {
    options.split_whitespace().map(OsString::from)
}

fn run_copy_tool<B: CopyBackend + ?Sized>(backend: &B, request: &CopyRequest<'_>) -> CopyOutcome {
    let kind = backend.kind();
    let tool = kind.tool_name();
    let program = backend.program();
    let args = backend.arguments(request);
    let category = request.category;

    info!(
        run = %request.run_id,
        %category,
        command = %render_command(program, &args),
        "launching copy tool"
    );

    let output = match Command::new(program).args(&args).output() {
        Ok(output) => output,
        Err(e) => {
            let message = format!(
                "Failed to launch {} for {} of run: {}: {}",
                tool, category, request.run_id, e
            );
            error!(run = %request.run_id, %category, error = %e, "copy tool could not be started");
            return CopyOutcome {
                category,
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
                classification: Classification::Failure,
                message,
            };
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(run = %request.run_id, %category, "STDOUT:\n{}", stdout);

    let (classification, message) = match output.status.code() {
        Some(code) => {
            let (classification, meaning) = kind.exit_codes().classify(code);
            let message = if classification.is_failure() {
                format!(
                    "Error copying {} for run: {} with {} exit code '{}': {}",
                    category, request.run_id, tool, code, meaning
                )
            } else {
                format!(
                    "Copied {} for run: {} with {} exit code '{}': {}",
                    category, request.run_id, tool, code, meaning
                )
            };
            (classification, message)
        }
        None => (
            Classification::Failure,
            format!(
                "Error copying {} for run: {}: {} was terminated before it exited",
                category, request.run_id, tool
            ),
        ),
    };

    if classification.is_failure() {
        error!(run = %request.run_id, %category, "{}", message);
        if !stderr.is_empty() {
            error!(run = %request.run_id, %category, "STDERR: {}", stderr);
        }
    } else {
        info!(run = %request.run_id, %category, "{}", message);
    }

    CopyOutcome {
        category,
        exit_code: output.status.code(),
        stdout,
        stderr,
        classification,
        message,
    }
}
