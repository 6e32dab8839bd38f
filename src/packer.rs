//! Walks a directory tree into a new archive.

use crate::errors::{Error, ErrorKind};
use crate::time::DosDateTime;
use crate::{CompressionMethod, ZipArchiveWriter, ZipDataWriter};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// How hard to compress file entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Store entries as is
    None,

    /// Deflate at level 1
    Fastest,

    /// Deflate at level 9
    #[default]
    Optimal,
}

impl CompressionLevel {
    /// The compression method entries are written with
    pub fn method(&self) -> CompressionMethod {
        match self {
            CompressionLevel::None => CompressionMethod::Store,
            CompressionLevel::Fastest | CompressionLevel::Optimal => CompressionMethod::Deflate,
        }
    }

    /// The deflate setting, if the level deflates at all
    pub fn deflate(&self) -> Option<flate2::Compression> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Fastest => Some(flate2::Compression::fast()),
            CompressionLevel::Optimal => Some(flate2::Compression::best()),
        }
    }

    /// The equivalent `-N` level of the Info-ZIP `zip` command
    pub fn zip_level(&self) -> u32 {
        match self {
            CompressionLevel::None => 0,
            CompressionLevel::Fastest => 1,
            CompressionLevel::Optimal => 9,
        }
    }
}

impl std::str::FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CompressionLevel::None),
            "fastest" => Ok(CompressionLevel::Fastest),
            "optimal" => Ok(CompressionLevel::Optimal),
            _ => Err(format!(
                "unknown compression level '{}' (expected none, fastest or optimal)",
                s
            )),
        }
    }
}

/// What a packing run wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub files: usize,
    pub directories: usize,
}

impl PackSummary {
    /// Total entries in the archive
    pub fn entries(&self) -> usize {
        self.files + self.directories
    }
}

/// Writes every file under `source_dir` into a new archive at `target`.
///
/// Entry paths are rooted at the source directory's own name so that
/// extracting the archive recreates that directory. Only empty
/// subdirectories get entries of their own; the rest are implied by the files
/// within them. Siblings are visited in file name order.
///
/// An existing `target` is overwritten.
pub fn pack_directory(
    source_dir: &Path,
    target: &Path,
    level: CompressionLevel,
) -> Result<PackSummary, Error> {
    let root_name = root_name(source_dir)?;

    let file = File::create(target)?;
    let mut archive = ZipArchiveWriter::new(BufWriter::new(file));
    let mut summary = PackSummary {
        files: 0,
        directories: 0,
    };

    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| Error::invalid_input("walked outside of the source directory"))?;
        let name = entry_name(&root_name, relative)?;
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DosDateTime::from_system_time)
            .unwrap_or_default();

        if entry.file_type().is_dir() {
            if fs::read_dir(entry.path())?.next().is_none() {
                let name = format!("{}/", name);
                debug!("adding: {}", name);
                archive.new_dir(&name).last_modified(modified).create()?;
                summary.directories += 1;
            }
        } else {
            debug!("adding: {}", name);
            add_file(&mut archive, entry.path(), &name, level, modified)?;
            summary.files += 1;
        }
    }

    let writer = archive.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(summary)
}

/// Validates the source directory and returns the name entries are rooted
/// at.
pub(crate) fn root_name(source_dir: &Path) -> Result<String, Error> {
    let metadata = match fs::metadata(source_dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::from(ErrorKind::MissingSourceDirectory {
                path: source_dir.to_path_buf(),
            }));
        }
        Err(e) => return Err(Error::io(e)),
    };

    if !metadata.is_dir() {
        return Err(Error::from(ErrorKind::NotADirectory {
            path: source_dir.to_path_buf(),
        }));
    }

    // Resolves names like "." or "bundle/.."
    let canonical = fs::canonicalize(source_dir)?;
    canonical
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "source directory has no UTF-8 name: {}",
                source_dir.display()
            ))
        })
}

/// Joins path components with forward slashes under the root name.
fn entry_name(root_name: &str, relative: &Path) -> Result<String, Error> {
    let mut name = String::from(root_name);
    for component in relative.components() {
        let Component::Normal(part) = component else {
            return Err(Error::invalid_input(format!(
                "unexpected path component in {}",
                relative.display()
            )));
        };
        let part = part.to_str().ok_or_else(|| {
            Error::invalid_input(format!("path is not valid UTF-8: {}", relative.display()))
        })?;
        name.push('/');
        name.push_str(part);
    }
    Ok(name)
}

fn add_file<W: Write>(
    archive: &mut ZipArchiveWriter<W>,
    path: &Path,
    name: &str,
    level: CompressionLevel,
    modified: DosDateTime,
) -> Result<(), Error> {
    let mut source = File::open(path)?;
    let mut file = archive
        .new_file(name)
        .compression_method(level.method())
        .last_modified(modified)
        .create()?;

    match level.deflate() {
        None => {
            let mut writer = ZipDataWriter::new(&mut file);
            io::copy(&mut source, &mut writer)?;
            let (_, output) = writer.finish()?;
            file.finish(output)?;
        }
        Some(compression) => {
            let encoder = flate2::write::DeflateEncoder::new(&mut file, compression);
            let mut writer = ZipDataWriter::new(encoder);
            io::copy(&mut source, &mut writer)?;
            let (encoder, output) = writer.finish()?;
            encoder.finish()?;
            file.finish(output)?;
        }
    }

    Ok(())
}
