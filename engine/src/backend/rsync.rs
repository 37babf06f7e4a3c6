//! Rsync backend (Linux).

use std::ffi::OsString;
use std::path::{Path, PathBuf, MAIN_SEPARATOR_STR};

use super::{split_options, BackendKind, CopyBackend, CopyRequest, ExitCodeEntry, ExitCodeTable};
use crate::model::Classification::{Failure, Success};

macro_rules! failure {
    ($code:expr, $meaning:expr) => {
        ExitCodeEntry {
            code: $code,
            classification: Failure,
            meaning: $meaning,
        }
    };
}

/// Rsync exit codes. Anything other than 0 is a failure; the rows exist so the
/// report can say what went wrong.
pub static RSYNC_EXIT_CODES: ExitCodeTable = ExitCodeTable {
    entries: &[
        ExitCodeEntry {
            code: 0,
            classification: Success,
            meaning: "Success.",
        },
        failure!(1, "Syntax or usage error."),
        failure!(2, "Protocol incompatibility."),
        failure!(3, "Errors selecting input/output files, dirs."),
        failure!(4, "Requested action not supported."),
        failure!(5, "Error starting client-server protocol."),
        failure!(6, "Daemon unable to append to log-file."),
        failure!(10, "Error in socket I/O."),
        failure!(11, "Error in file I/O."),
        failure!(12, "Error in rsync protocol data stream."),
        failure!(13, "Errors with program diagnostics."),
        failure!(14, "Error in IPC code."),
        failure!(20, "Received SIGUSR1 or SIGINT."),
        failure!(21, "Some error returned by waitpid()."),
        failure!(22, "Error allocating core memory buffers."),
        failure!(23, "Partial transfer due to error."),
        failure!(24, "Partial transfer due to vanished source files."),
        failure!(25, "The --max-delete limit stopped deletions."),
        failure!(30, "Timeout in data send/receive."),
        failure!(35, "Timeout waiting for daemon connection."),
    ],
    unknown_meaning: "Unrecognised rsync exit code.",
};

#[derive(Debug, Clone)]
pub struct RsyncBackend {
    program: PathBuf,
}

impl RsyncBackend {
    pub fn new() -> Self {
        Self::with_program("rsync")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        RsyncBackend {
            program: program.into(),
        }
    }
}

impl Default for RsyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyBackend for RsyncBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rsync
    }

    fn program(&self) -> &Path {
        &self.program
    }

    /// `rsync <options...> --log-file=<log> <src>/ <dst>`
    ///
    /// The trailing separator on the source copies its contents into the
    /// destination rather than nesting a second run directory.
    fn arguments(&self, request: &CopyRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = split_options(request.options).collect();

        let mut log = OsString::from("--log-file=");
        log.push(request.log_path.as_os_str());
        args.push(log);

        let mut source = request.source.as_os_str().to_os_string();
        if !source.to_string_lossy().ends_with(MAIN_SEPARATOR_STR) {
            source.push(MAIN_SEPARATOR_STR);
        }
        args.push(source);
        args.push(request.destination.as_os_str().to_os_string());
        args
    }
}
