//! What happens to the build directory once it has been archived.

use crate::Error;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginalBuildOption {
    /// Leave the directory as it is
    #[default]
    KeepOriginal,

    /// Remove the directory and everything in it
    Delete,

    /// Remove everything in the directory but keep the directory itself
    KeepEmptyDirectory,
}

impl OriginalBuildOption {
    /// Applies the option to `source_dir`.
    ///
    /// Only call this once an archive has been produced from `source_dir`.
    pub fn apply(&self, source_dir: &Path) -> Result<(), Error> {
        match self {
            OriginalBuildOption::KeepOriginal => {}
            OriginalBuildOption::Delete => {
                info!("deleting build directory {}", source_dir.display());
                fs::remove_dir_all(source_dir)?;
            }
            OriginalBuildOption::KeepEmptyDirectory => {
                info!("emptying build directory {}", source_dir.display());
                for entry in fs::read_dir(source_dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        fs::remove_dir_all(entry.path())?;
                    } else {
                        fs::remove_file(entry.path())?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for OriginalBuildOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-original" | "keep_original" => Ok(OriginalBuildOption::KeepOriginal),
            "delete" => Ok(OriginalBuildOption::Delete),
            "keep-empty-directory" | "keep_empty_directory" => {
                Ok(OriginalBuildOption::KeepEmptyDirectory)
            }
            _ => Err(format!(
                "unknown build option '{}' (expected keep-original, delete or keep-empty-directory)",
                s
            )),
        }
    }
}
