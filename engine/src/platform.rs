//! Supported host platforms and platform-specific path handling.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::backend::{CopyBackend, RobocopyBackend, RsyncBackend};
use crate::error::EngineError;

/// Closed set of platforms a run can execute on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
}

impl Platform {
    /// Map the compile target to a supported platform.
    pub fn detect() -> Result<Platform, EngineError> {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(name: &str) -> Result<Platform, EngineError> {
        match name.to_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            _ => Err(EngineError::UnsupportedPlatform {
                name: name.to_string(),
            }),
        }
    }

    /// Key of this platform's section in the settings file.
    pub fn config_key(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }

    /// The copy tool used on this platform.
    pub fn backend(&self) -> Box<dyn CopyBackend> {
        match self {
            Platform::Windows => Box::new(RobocopyBackend::new()),
            Platform::Linux => Box::new(RsyncBackend::new()),
        }
    }

    /// The copy tool used on this platform, launched from `program`.
    pub fn backend_with_program(&self, program: &Path) -> Box<dyn CopyBackend> {
        match self {
            Platform::Windows => Box::new(RobocopyBackend::with_program(program)),
            Platform::Linux => Box::new(RsyncBackend::with_program(program)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "Windows"),
            Platform::Linux => write!(f, "Linux"),
        }
    }
}

/// Convert a path to the extended-length form on Windows so deep trees are not
/// cut off at MAX_PATH. Identity on other platforms.
#[cfg(windows)]
pub fn extended_path(path: &Path) -> PathBuf {
    let absolute = match std::path::absolute(path) {
        Ok(p) => p,
        Err(_) => return path.to_path_buf(),
    };
    with_extended_prefix(&absolute.to_string_lossy())
}

#[cfg(not(windows))]
pub fn extended_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Prefix an absolute Windows path string with `\\?\` (or `\\?\UNC\` for shares).
#[cfg_attr(not(windows), allow(dead_code))]
fn with_extended_prefix(absolute: &str) -> PathBuf {
    if absolute.starts_with(r"\\?\") {
        PathBuf::from(absolute)
    } else if let Some(share) = absolute.strip_prefix(r"\\") {
        PathBuf::from(format!(r"\\?\UNC\{}", share))
    } else {
        PathBuf::from(format!(r"\\?\{}", absolute))
    }
}
