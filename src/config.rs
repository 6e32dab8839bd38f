//! Settings for building archives.
//!
//! Settings are plain values handed to the pipeline. They can be persisted
//! as JSON so a project keeps its choices between builds.

use crate::cleanup::OriginalBuildOption;
use crate::packer::CompressionLevel;
use crate::Error;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the archive gets created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZipCreationMethod {
    /// Write the archive in process and patch in Unix permissions
    #[default]
    Patch,

    /// Shell out to the system `zip` command
    Command,
}

impl std::str::FromStr for ZipCreationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(ZipCreationMethod::Patch),
            "command" => Ok(ZipCreationMethod::Command),
            _ => Err(format!(
                "unknown zip creation method '{}' (expected patch or command)",
                s
            )),
        }
    }
}

/// What the archiving pipeline needs to know
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub compression: CompressionLevel,

    /// Where to write the archive. Defaults to `<source_dir>.zip`.
    pub target: Option<PathBuf>,
}

/// Persisted build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub zip_creation_method: ZipCreationMethod,
    pub zip_compression_level: CompressionLevel,
    pub original_build_option: OriginalBuildOption,

    /// Seconds the `zip` command may run before it is killed
    pub command_timeout_secs: u64,

    pub verbose_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            zip_creation_method: ZipCreationMethod::default(),
            zip_compression_level: CompressionLevel::default(),
            original_build_option: OriginalBuildOption::default(),
            command_timeout_secs: 60,
            verbose_logging: false,
        }
    }
}

impl Settings {
    /// Reads settings from `path`, first writing the defaults there if the
    /// file doesn't exist.
    pub fn load_or_create(path: &Path) -> Result<Settings, Error> {
        if path.exists() {
            Settings::load(path)
        } else {
            debug!("creating default settings at {}", path.display());
            let settings = Settings::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    pub fn load(path: &Path) -> Result<Settings, Error> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Writes the settings as pretty printed JSON
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            compression: self.zip_compression_level,
            target: None,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
