//! Checks that the designated executable will survive extraction.

use crate::archive::ZipSliceArchive;
use crate::mode::{HostSystem, EXECUTABLE_MASK};
use crate::utils::attribute_bits;
use crate::Error;
use log::{debug, warn};
use std::path::Path;

/// Result of verifying a finished archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The executable entry carries the full executable bit pattern
    Passed { attributes: u32 },

    /// The executable entry exists but its attributes lack some of the
    /// executable bits. The host is kept for diagnostics.
    Failed { attributes: u32, host: HostSystem },

    /// No entry has the designated path
    Missing,
}

impl Verification {
    pub fn passed(&self) -> bool {
        matches!(self, Verification::Passed { .. })
    }

    /// The raw attributes of the executable entry, when there is one
    pub fn attributes(&self) -> Option<u32> {
        match *self {
            Verification::Passed { attributes } | Verification::Failed { attributes, .. } => {
                Some(attributes)
            }
            Verification::Missing => None,
        }
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Verification::Passed { attributes } => {
                write!(f, "unix perms test passed: {}", attribute_bits(attributes))
            }
            Verification::Failed { attributes, host } => {
                write!(
                    f,
                    "unix perms test failed: {} (host {:?})",
                    attribute_bits(attributes),
                    host
                )
            }
            Verification::Missing => write!(f, "unix perms test failed: entry not found"),
        }
    }
}

/// Reopens the archive at `path` read-only and checks the entry at
/// `executable_path`.
///
/// A failed verification is not an error: the archive is still usable, it
/// just may not keep its permissions once extracted. Errors are reserved for
/// archives that can't be read.
pub fn verify_executable(path: &Path, executable_path: &str) -> Result<Verification, Error> {
    let data = std::fs::read(path)?;
    let archive = ZipSliceArchive::from_slice(&data)?;

    let result = match archive.find(executable_path)? {
        None => Verification::Missing,
        Some(record) => {
            let attributes = record.external_attributes();
            let host = record.host_system();
            if attributes & EXECUTABLE_MASK == EXECUTABLE_MASK {
                Verification::Passed { attributes }
            } else {
                Verification::Failed { attributes, host }
            }
        }
    };

    if result.passed() {
        debug!("{}: {}", executable_path, result);
    } else {
        warn!("{}: {}", executable_path, result);
    }

    Ok(result)
}
