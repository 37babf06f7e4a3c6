//! Settings file loading and drive profile resolution.
//!
//! The settings file is TOML with one section per platform plus a notifier
//! section. Loading only parses; choosing the roots for a particular run
//! (primary, alternate disk or debug source) is done by [`Settings::drive_profile`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::CopyBackend;
use crate::error::EngineError;
use crate::platform::Platform;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".run_archiver.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub notifier: NotifierSettings,
    pub windows: Option<PlatformSettings>,
    pub linux: Option<PlatformSettings>,
}

/// Roots and tool options for one platform.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformSettings {
    /// Primary source volume (the instrument's analysis drive)
    pub source_root: PathBuf,
    /// External disk holding runs moved off the primary drive
    pub alternate_source_root: Option<PathBuf>,
    /// Test data root used with `--debug`
    pub debug_source_root: Option<PathBuf>,
    /// Archival volume
    pub destination_root: PathBuf,
    /// Directory for the master log of all runs
    pub log_root: PathBuf,
    /// Copy tool options, passed through verbatim
    #[serde(default)]
    pub tool_options: String,
    /// Copy tool executable; looked up on PATH when absent
    pub tool_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSettings {
    pub smtp_server: String,
    pub sender: String,
    #[serde(default)]
    pub development: Vec<String>,
    #[serde(default)]
    pub production: Vec<String>,
}

impl NotifierSettings {
    /// Development addressees for debug runs and Linux hosts, production otherwise.
    pub fn addressees(&self, platform: Platform, debug: bool) -> &[String] {
        if debug || platform == Platform::Linux {
            &self.development
        } else {
            &self.production
        }
    }
}

/// Which source root a run reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSelection {
    /// Read from the alternate (external disk) root
    pub alternate: bool,
    /// Read from the debug root; takes precedence over `alternate`
    pub debug: bool,
}

/// Resolved roots and options active for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveProfile {
    pub platform: Platform,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub log_root: PathBuf,
    pub tool_options: String,
    pub tool_path: Option<PathBuf>,
}

impl DriveProfile {
    /// The copy backend for this profile's platform, using the configured
    /// executable if there is one.
    pub fn backend(&self) -> Box<dyn CopyBackend> {
        match &self.tool_path {
            Some(program) => self.platform.backend_with_program(program),
            None => self.platform.backend(),
        }
    }
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, EngineError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::ConfigurationMissing {
                path: path.to_path_buf(),
            }
        } else {
            EngineError::ConfigurationUnreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    Settings::from_toml(&content).map_err(|e| EngineError::ConfigurationInvalid {
        path: path.to_path_buf(),
        source: e,
    })
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Settings, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn platform(&self, platform: Platform) -> Result<&PlatformSettings, EngineError> {
        let section = match platform {
            Platform::Windows => self.windows.as_ref(),
            Platform::Linux => self.linux.as_ref(),
        };
        section.ok_or_else(|| EngineError::SettingMissing {
            key: platform.config_key().to_string(),
        })
    }

    /// Resolve the single drive profile active for a run.
    pub fn drive_profile(
        &self,
        platform: Platform,
        selection: SourceSelection,
    ) -> Result<DriveProfile, EngineError> {
        let section = self.platform(platform)?;
        let key = platform.config_key();

        let source_root = if selection.debug {
            section
                .debug_source_root
                .clone()
                .ok_or_else(|| EngineError::SettingMissing {
                    key: format!("{}.debug_source_root", key),
                })?
        } else if selection.alternate {
            section
                .alternate_source_root
                .clone()
                .ok_or_else(|| EngineError::SettingMissing {
                    key: format!("{}.alternate_source_root", key),
                })?
        } else {
            section.source_root.clone()
        };

        Ok(DriveProfile {
            platform,
            source_root,
            destination_root: section.destination_root.clone(),
            log_root: section.log_root.clone(),
            tool_options: section.tool_options.clone(),
            tool_path: section.tool_path.clone(),
        })
    }
}
