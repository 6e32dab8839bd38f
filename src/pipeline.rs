//! Pack, annotate, patch and verify, in that order.

use crate::annotate::{annotate_permissions, AnnotateSummary};
use crate::config::ArchiveConfig;
use crate::packer::{pack_directory, root_name, PackSummary};
use crate::patch::{patch_archive, PatchReport};
use crate::verify::{verify_executable, Verification};
use crate::{Error, ErrorKind};
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Everything a finished build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// The archive that was written
    pub archive: PathBuf,
    pub pack: PackSummary,
    pub annotate: AnnotateSummary,
    pub patch: PatchReport,
    pub verification: Verification,
}

impl ArchiveReport {
    /// Number of entries in the archive
    pub fn entries(&self) -> usize {
        self.pack.entries()
    }

    /// Whether every entry was patched and the executable verified
    pub fn is_clean(&self) -> bool {
        self.patch.is_complete() && self.verification.passed()
    }
}

/// The default archive location: a sibling of `source_dir` named after it,
/// with `.zip` appended.
pub fn archive_path_for(source_dir: &Path) -> Result<PathBuf, Error> {
    let dir = if source_dir.file_name().is_some() {
        source_dir.to_path_buf()
    } else {
        match fs::canonicalize(source_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::from(ErrorKind::MissingSourceDirectory {
                    path: source_dir.to_path_buf(),
                }));
            }
            Err(e) => return Err(Error::io(e)),
        }
    };

    let name = dir.file_name().ok_or_else(|| {
        Error::invalid_input(format!(
            "can't name an archive after {}",
            source_dir.display()
        ))
    })?;
    let mut file_name = name.to_os_string();
    file_name.push(".zip");
    Ok(dir.with_file_name(file_name))
}

/// Builds an archive of `source_dir` in which the entry at
/// `executable_path` keeps its executable bits once extracted.
///
/// `executable_path` is the entry path, so it begins with the source
/// directory's name (eg: `App.app/Contents/MacOS/App`).
///
/// The source directory is checked before anything on disk changes. A stale
/// archive at the target is then removed. An incomplete patch or a failed
/// verification is reported, not returned as an error.
pub fn build_archive(
    config: &ArchiveConfig,
    source_dir: &Path,
    executable_path: &str,
) -> Result<ArchiveReport, Error> {
    let archive = match &config.target {
        Some(target) => target.clone(),
        None => archive_path_for(source_dir)?,
    };

    root_name(source_dir)?;

    match fs::remove_file(&archive) {
        Ok(()) => debug!("removed stale archive {}", archive.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::io(e)),
    }

    info!(
        "packing {} into {} ({:?})",
        source_dir.display(),
        archive.display(),
        config.compression
    );
    let pack = pack_directory(source_dir, &archive, config.compression)?;
    debug!(
        "packed {} files and {} empty directories",
        pack.files, pack.directories
    );

    info!("annotating permissions");
    let annotate = annotate_permissions(&archive, executable_path)?;

    info!("patching host system");
    let patch = patch_archive(&archive, pack.entries())?;

    let verification = verify_executable(&archive, executable_path)?;
    info!("{}", verification);

    Ok(ArchiveReport {
        archive,
        pack,
        annotate,
        patch,
        verification,
    })
}
