//! Robocopy backend (Windows).
//!
//! Robocopy's exit code is a bitmask: 1 = files copied, 2 = extra files,
//! 4 = mismatches, 8 = some copies failed, 16 = fatal error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::{split_options, BackendKind, CopyBackend, CopyRequest, ExitCodeEntry, ExitCodeTable};
use crate::model::Classification::{Failure, PartialSuccess, Success};

pub static ROBOCOPY_EXIT_CODES: ExitCodeTable = ExitCodeTable {
    entries: &[
        ExitCodeEntry {
            code: 0,
            classification: Success,
            meaning: "No files were copied. No failure was encountered. No files were mismatched. \
                      The files already exist in the destination directory; therefore, the copy \
                      operation was skipped.",
        },
        ExitCodeEntry {
            code: 1,
            classification: Success,
            meaning: "All files were copied successfully.",
        },
        ExitCodeEntry {
            code: 2,
            classification: PartialSuccess,
            meaning: "There are some additional files in the destination directory that aren't \
                      present in the source directory. No files were copied.",
        },
        ExitCodeEntry {
            code: 3,
            classification: PartialSuccess,
            meaning: "Some files were copied. Additional files were present. No failure was encountered.",
        },
        ExitCodeEntry {
            code: 5,
            classification: PartialSuccess,
            meaning: "Some files were copied. Some files were mismatched. No failure was encountered.",
        },
        ExitCodeEntry {
            code: 6,
            classification: PartialSuccess,
            meaning: "Additional files and mismatched files exist. No files were copied and no \
                      failures were encountered meaning that the files already exist in the \
                      destination directory.",
        },
        ExitCodeEntry {
            code: 7,
            classification: PartialSuccess,
            meaning: "Files were copied, a file mismatch was present, and additional files were present.",
        },
        ExitCodeEntry {
            code: 8,
            classification: Failure,
            meaning: "Several files did not copy.",
        },
        ExitCodeEntry {
            code: 16,
            classification: Failure,
            meaning: "Serious error. Robocopy did not copy any files. Either a usage error or an \
                      error due to insufficient access privileges on the source or destination \
                      directories.",
        },
    ],
    unknown_meaning: "Unrecognised robocopy exit code. At least one failure occurred during the \
                      copy operation.",
};

#[derive(Debug, Clone)]
pub struct RobocopyBackend {
    program: PathBuf,
}

impl RobocopyBackend {
    pub fn new() -> Self {
        Self::with_program("robocopy")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        RobocopyBackend {
            program: program.into(),
        }
    }
}

impl Default for RobocopyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyBackend for RobocopyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Robocopy
    }

    fn program(&self) -> &Path {
        &self.program
    }

    /// `robocopy <src> <dst> <options...> /MT:<threads> /LOG:<log>`
    fn arguments(&self, request: &CopyRequest<'_>) -> Vec<OsString> {
        let mut args = vec![
            request.source.as_os_str().to_os_string(),
            request.destination.as_os_str().to_os_string(),
        ];
        args.extend(split_options(request.options));
        args.push(OsString::from(format!("/MT:{}", request.threads)));

        let mut log = OsString::from("/LOG:");
        log.push(request.log_path.as_os_str());
        args.push(log);
        args
    }
}
