//! Rewrites the host system of every central directory header to Unix.
//!
//! Conventional zip writers hardcode the FAT host in "version made by" and
//! offer no way to change it, so extraction tools read the external
//! attributes as DOS bits and drop the POSIX mode stored there. This module
//! patches the host byte directly in the archive's bytes.
//!
//! Headers are found by signature rather than by walking the central
//! directory. A stored entry whose data happens to contain a header
//! signature followed by the expected version byte is patched too, and the
//! skip past that false match can hide a real header that follows closely.
//! [`patch_archive`] surfaces both: the scan count against the entry count,
//! and a reparse of the patched central directory for headers still not on
//! Unix.

use crate::archive::ZipSliceArchive;
use crate::mode::HostSystem;
use crate::writer::VERSION_NEEDED_DEFAULT;
use crate::Error;
use log::{debug, error, info};
use std::fs;
use std::io::Write;
use std::path::Path;

/// `PK\x01\x02`
pub const CENTRAL_HEADER_SIGNATURE_BYTES: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];

/// Size of the fixed portion of a central directory header. No two headers
/// start closer together than this.
pub const CENTRAL_HEADER_FIXED_SIZE: usize = 46;

/// Offset of the host byte (high byte of "version made by") within a header
pub const HOST_SYSTEM_OFFSET: usize = 5;

/// Offset of the low byte of "version made by" within a header. The writer
/// stores the same version (2.0) there as in "version needed to extract", so
/// matching it tells real headers apart from stray signature bytes.
pub const VERSION_OFFSET: usize = 4;

/// Outcome of patching an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchReport {
    /// Headers rewritten
    pub patched: usize,

    /// Entries the archive was known to contain
    pub expected: usize,

    /// Central directory headers whose host is still not Unix after the scan
    pub unpatched: usize,
}

impl PatchReport {
    /// Whether every entry, and nothing else, was patched. When false, some
    /// entries may keep DOS semantics and lose their permissions on
    /// extraction.
    pub fn is_complete(&self) -> bool {
        self.patched == self.expected && self.unpatched == 0
    }
}

/// Sets the host byte of every central directory header in `buf` to Unix and
/// returns how many headers were patched.
///
/// A header is recognized by its signature followed immediately by the
/// version byte the writer uses (`0x14`).
pub fn patch_host_os(buf: &mut [u8]) -> usize {
    let version = VERSION_NEEDED_DEFAULT as u8;
    let mut patched = 0;
    let mut pos = 0;
    while pos + HOST_SYSTEM_OFFSET < buf.len() {
        let candidate = &buf[pos..];
        if candidate.starts_with(&CENTRAL_HEADER_SIGNATURE_BYTES)
            && candidate[VERSION_OFFSET] == version
        {
            buf[pos + HOST_SYSTEM_OFFSET] = HostSystem::Unix.as_u8();
            patched += 1;
            pos += CENTRAL_HEADER_FIXED_SIZE;
        } else {
            pos += 1;
        }
    }
    patched
}

/// Patches the archive at `path` in one read and one write.
///
/// `expected_entries` is the number of entries the archive is known to
/// contain. A mismatch is logged and reported, but the patched archive is
/// still written since partial patching beats none.
///
/// Fails if the patched bytes no longer parse as an archive, in which case
/// nothing is written.
pub fn patch_archive(path: &Path, expected_entries: usize) -> Result<PatchReport, Error> {
    let mut data = fs::read(path)?;
    let patched = patch_host_os(&mut data);
    let unpatched = count_unpatched(&data)?;
    let report = PatchReport {
        patched,
        expected: expected_entries,
        unpatched,
    };

    if report.patched != report.expected {
        error!(
            "number of modified entries does not match actual entry count (expected: {}, modified: {})",
            expected_entries, patched
        );
    }
    if unpatched > 0 {
        error!("{} central directory headers were missed by the scan", unpatched);
    }
    if report.is_complete() {
        info!("zip host os changed to unix ({} entries modified)", patched);
    }

    replace_file(path, &data)?;
    Ok(report)
}

/// Counts central directory headers that don't record a Unix host
fn count_unpatched(data: &[u8]) -> Result<usize, Error> {
    let archive = ZipSliceArchive::from_slice(data)?;
    let mut entries = archive.entries();
    let mut unpatched = 0;
    while let Some(record) = entries.next_entry()? {
        if record.host_system() != HostSystem::Unix {
            debug!(
                "{} still has host {:?}",
                String::from_utf8_lossy(record.file_name()),
                record.host_system()
            );
            unpatched += 1;
        }
    }
    Ok(unpatched)
}

/// Replaces the contents of `path` by writing a sibling temporary file and
/// renaming it over the original. Falls back to truncating and overwriting
/// when that isn't possible (eg: no write access to the directory).
pub(crate) fn replace_file(path: &Path, data: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = fs::metadata(path).map(|m| m.permissions()).ok();
    let persisted = tempfile::NamedTempFile::new_in(dir).and_then(|mut temp| {
        temp.write_all(data)?;
        if let Some(permissions) = permissions {
            temp.as_file().set_permissions(permissions)?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    });

    if let Err(e) = persisted {
        debug!(
            "atomic replace of {} failed ({}), overwriting in place",
            path.display(),
            e
        );
        fs::write(path, data)?;
    }

    Ok(())
}
