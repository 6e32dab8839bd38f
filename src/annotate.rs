//! Stamps POSIX modes into the external attributes of every entry.
//!
//! This is the entry-model half of the permission workaround: the attributes
//! are correct afterwards, but extraction tools still ignore them until
//! [`patch`](crate::patch) declares the entries as made on Unix.

use crate::archive::ZipSliceArchive;
use crate::mode::PosixMode;
use crate::Error;
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// What an annotation run changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotateSummary {
    /// Number of entries in the archive
    pub entries: usize,

    /// Whether an entry matched the designated executable path
    pub executable_found: bool,
}

/// The mode an entry receives
pub fn mode_for(path: &[u8], executable_path: &str) -> PosixMode {
    if path == executable_path.as_bytes() {
        PosixMode::EXECUTABLE
    } else if path.last() == Some(&b'/') {
        PosixMode::DIRECTORY
    } else {
        PosixMode::DEFAULT
    }
}

/// ORs a POSIX mode into the external attributes of every entry of the
/// archive at `path`, modifying the file in place.
///
/// The entry whose path equals `executable_path` receives
/// [`PosixMode::EXECUTABLE`]. Paths and payloads are untouched.
pub fn annotate_permissions(path: &Path, executable_path: &str) -> Result<AnnotateSummary, Error> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let updates = attribute_updates(&data, executable_path)?;
    let summary = AnnotateSummary {
        entries: updates.len(),
        executable_found: updates.iter().any(|u| u.executable),
    };

    for update in &updates {
        file.seek(SeekFrom::Start(update.offset))?;
        file.write_all(&update.attributes.to_le_bytes())?;
    }
    file.sync_all()?;

    if !summary.executable_found {
        warn!(
            "no entry matches the executable path {}; it won't be marked executable",
            executable_path
        );
    }

    Ok(summary)
}

#[derive(Debug)]
struct AttributeUpdate {
    offset: u64,
    attributes: u32,
    executable: bool,
}

/// Computes the new external attributes of every entry and where they live
fn attribute_updates(data: &[u8], executable_path: &str) -> Result<Vec<AttributeUpdate>, Error> {
    let archive = ZipSliceArchive::from_slice(data)?;
    let mut entries = archive.entries();
    let mut updates = Vec::new();
    while let Some(record) = entries.next_entry()? {
        let mode = mode_for(record.file_name(), executable_path);
        let attributes = record.external_attributes() | mode.as_external_attributes();
        debug!(
            "{}: {} (attributes 0x{:08x})",
            String::from_utf8_lossy(record.file_name()),
            mode,
            attributes
        );
        updates.push(AttributeUpdate {
            offset: record.external_attributes_offset(),
            attributes,
            executable: mode == PosixMode::EXECUTABLE,
        });
    }
    Ok(updates)
}
