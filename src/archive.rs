//! Read-only view of a zip archive held in memory.
//!
//! Only what the permission pipeline needs: locate the end of central
//! directory, walk the central directory headers, and hand out entry data.
//! Zip64 archives are not understood.

use crate::errors::{Error, ErrorKind};
use crate::mode::{HostSystem, PosixMode};
use crate::utils::{le_u16, le_u32};

pub(crate) const CENTRAL_HEADER_SIGNATURE: u32 = 0x02014b50;
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub(crate) const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub(crate) const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x06054b50;

/// Offset of the external attributes within a central directory header.
pub(crate) const EXTERNAL_ATTRIBUTES_OFFSET: usize = 38;

/// The compression method used on an individual Zip archive entry
///
/// APPNOTE.TXT section 4.4.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn as_id(&self) -> u16 {
        match *self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(id) => id,
        }
    }
}

impl From<u16> for CompressionMethod {
    fn from(id: u16) -> Self {
        match id {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            x => CompressionMethod::Unknown(x),
        }
    }
}

/// A zip archive backed by a byte slice.
#[derive(Debug)]
pub struct ZipSliceArchive<'a> {
    data: &'a [u8],
    eocd: EndOfCentralDirectoryRecordFixed,
}

impl<'a> ZipSliceArchive<'a> {
    /// Locates the end of central directory record, searching backwards
    /// through the space a trailing archive comment could occupy.
    pub fn from_slice(data: &'a [u8]) -> Result<ZipSliceArchive<'a>, Error> {
        const MAX_SEARCH: usize = EndOfCentralDirectoryRecordFixed::SIZE + u16::MAX as usize;
        let start = data.len().saturating_sub(MAX_SEARCH);
        let signature = END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes();
        let location = data[start..]
            .windows(signature.len())
            .rposition(|window| window == signature)
            .map(|pos| pos + start)
            .ok_or(ErrorKind::MissingEndOfCentralDirectory)?;

        let eocd = EndOfCentralDirectoryRecordFixed::parse(&data[location..])?;
        Ok(ZipSliceArchive { data, eocd })
    }

    /// The number of entries the end of central directory claims
    pub fn entries_hint(&self) -> u64 {
        u64::from(self.eocd.num_entries)
    }

    /// Iterates over the central directory
    pub fn entries(&self) -> ZipSliceEntries<'a> {
        let offset = (self.eocd.central_dir_offset as usize).min(self.data.len());
        ZipSliceEntries {
            data: self.data,
            offset,
            remaining: self.eocd.num_entries,
        }
    }

    /// Collects every central directory record in archive order
    pub fn records(&self) -> Result<Vec<ZipFileHeaderRecord<'a>>, Error> {
        let mut entries = self.entries();
        let mut result = Vec::with_capacity(usize::from(self.eocd.num_entries));
        while let Some(entry) = entries.next_entry()? {
            result.push(entry);
        }
        Ok(result)
    }

    /// Finds the record whose raw path is exactly `path`
    pub fn find(&self, path: &str) -> Result<Option<ZipFileHeaderRecord<'a>>, Error> {
        let mut entries = self.entries();
        while let Some(entry) = entries.next_entry()? {
            if entry.file_name() == path.as_bytes() {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Returns the (possibly compressed) data of an entry
    pub fn get_entry(&self, record: &ZipFileHeaderRecord) -> Result<ZipSliceEntry<'a>, Error> {
        let header = self
            .data
            .get(record.local_header_offset as usize..)
            .ok_or(Error::from(ErrorKind::Eof))?;
        let file_header = ZipLocalFileHeaderFixed::parse(header)?;
        let body_start = ZipLocalFileHeaderFixed::SIZE + file_header.variable_length();
        let body_end = body_start + record.compressed_size as usize;
        let data = header
            .get(body_start..body_end)
            .ok_or(Error::from(ErrorKind::Eof))?;

        Ok(ZipSliceEntry {
            data,
            expected_crc: record.crc32,
            expected_size: u64::from(record.uncompressed_size),
        })
    }
}

/// Data of a single entry
#[derive(Debug)]
pub struct ZipSliceEntry<'a> {
    data: &'a [u8],
    expected_crc: u32,
    expected_size: u64,
}

impl<'a> ZipSliceEntry<'a> {
    /// The entry's data as stored, compressed or not
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Checks decompressed contents against the central directory
    pub fn verify(&self, contents: &[u8]) -> Result<(), Error> {
        if contents.len() as u64 != self.expected_size {
            return Err(Error::from(ErrorKind::InvalidSize {
                expected: self.expected_size,
                actual: contents.len() as u64,
            }));
        }

        let actual = crc32fast::hash(contents);
        if self.expected_crc != actual {
            return Err(Error::from(ErrorKind::InvalidChecksum {
                expected: self.expected_crc,
                actual,
            }));
        }

        Ok(())
    }
}

/// Cursor over the central directory of a [`ZipSliceArchive`]
#[derive(Debug)]
pub struct ZipSliceEntries<'a> {
    data: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> ZipSliceEntries<'a> {
    pub fn next_entry(&mut self) -> Result<Option<ZipFileHeaderRecord<'a>>, Error> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let header_offset = self.offset;
        let data = &self.data[header_offset..];
        let fixed = ZipFileHeaderFixed::parse(data)?;
        let variable = data
            .get(ZipFileHeaderFixed::SIZE..ZipFileHeaderFixed::SIZE + fixed.variable_length())
            .ok_or(Error::from(ErrorKind::Eof))?;

        self.offset += ZipFileHeaderFixed::SIZE + fixed.variable_length();
        self.remaining -= 1;

        Ok(Some(ZipFileHeaderRecord {
            header_offset: header_offset as u64,
            version_made_by: fixed.version_made_by,
            version_needed: fixed.version_needed,
            flags: fixed.flags,
            compression_method: fixed.compression_method,
            crc32: fixed.crc32,
            compressed_size: fixed.compressed_size,
            uncompressed_size: fixed.uncompressed_size,
            external_file_attrs: fixed.external_file_attrs,
            local_header_offset: fixed.local_header_offset,
            file_name: &variable[..fixed.file_name_len as usize],
        }))
    }
}

/// A central directory file header and its name
///
/// APPNOTE.TXT section 4.3.12
#[derive(Debug, Clone, Copy)]
pub struct ZipFileHeaderRecord<'a> {
    header_offset: u64,
    version_made_by: u16,
    version_needed: u16,
    flags: u16,
    compression_method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    external_file_attrs: u32,
    local_header_offset: u32,
    file_name: &'a [u8],
}

impl<'a> ZipFileHeaderRecord<'a> {
    /// Raw bytes of the entry's path
    pub fn file_name(&self) -> &'a [u8] {
        self.file_name
    }

    /// The entry's path, which must be UTF-8
    pub fn file_path(&self) -> Result<&'a str, Error> {
        std::str::from_utf8(self.file_name)
            .map_err(|_| Error::invalid_input("entry name is not valid UTF-8"))
    }

    pub fn is_dir(&self) -> bool {
        self.file_name.last() == Some(&b'/')
    }

    /// Offset of this header's signature from the start of the archive
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// Offset of this header's external attributes from the start of the
    /// archive
    pub fn external_attributes_offset(&self) -> u64 {
        self.header_offset + EXTERNAL_ATTRIBUTES_OFFSET as u64
    }

    /// The host recorded in the high byte of "version made by"
    pub fn host_system(&self) -> HostSystem {
        HostSystem::from((self.version_made_by >> 8) as u8)
    }

    pub fn version_made_by(&self) -> u16 {
        self.version_made_by
    }

    pub fn version_needed(&self) -> u16 {
        self.version_needed
    }

    pub fn external_attributes(&self) -> u32 {
        self.external_file_attrs
    }

    /// The POSIX mode in the high bits of the external attributes.
    ///
    /// Extraction tools only honor this when the host is Unix.
    pub fn mode(&self) -> PosixMode {
        PosixMode::from_external_attributes(self.external_file_attrs)
    }

    /// Describes if the file has a data descriptor that follows the compressed
    /// data
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & 0x08 != 0
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from(self.compression_method)
    }
}

#[derive(Debug)]
struct EndOfCentralDirectoryRecordFixed {
    num_entries: u16,
    central_dir_offset: u32,
}

impl EndOfCentralDirectoryRecordFixed {
    const SIZE: usize = 22;

    fn parse(data: &[u8]) -> Result<EndOfCentralDirectoryRecordFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let signature = le_u32(&data[0..4]);
        if signature != END_OF_CENTRAL_DIR_SIGNATURE {
            return Err(Error::from(ErrorKind::InvalidSignature {
                expected: END_OF_CENTRAL_DIR_SIGNATURE,
                actual: signature,
            }));
        }

        Ok(EndOfCentralDirectoryRecordFixed {
            num_entries: le_u16(&data[10..12]),
            central_dir_offset: le_u32(&data[16..20]),
        })
    }
}

struct ZipLocalFileHeaderFixed {
    file_name_len: u16,
    extra_field_len: u16,
}

impl ZipLocalFileHeaderFixed {
    const SIZE: usize = 30;

    fn parse(data: &[u8]) -> Result<ZipLocalFileHeaderFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let signature = le_u32(&data[0..4]);
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(Error::from(ErrorKind::InvalidSignature {
                expected: LOCAL_FILE_HEADER_SIGNATURE,
                actual: signature,
            }));
        }

        Ok(ZipLocalFileHeaderFixed {
            file_name_len: le_u16(&data[26..28]),
            extra_field_len: le_u16(&data[28..30]),
        })
    }

    fn variable_length(&self) -> usize {
        self.file_name_len as usize + self.extra_field_len as usize
    }
}

#[derive(Debug)]
struct ZipFileHeaderFixed {
    version_made_by: u16,
    version_needed: u16,
    flags: u16,
    compression_method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    file_name_len: u16,
    extra_field_len: u16,
    file_comment_len: u16,
    external_file_attrs: u32,
    local_header_offset: u32,
}

impl ZipFileHeaderFixed {
    /// Size of the fixed portion of a central directory header
    const SIZE: usize = 46;

    fn variable_length(&self) -> usize {
        self.file_name_len as usize + self.extra_field_len as usize + self.file_comment_len as usize
    }

    fn parse(data: &[u8]) -> Result<ZipFileHeaderFixed, Error> {
        if data.len() < Self::SIZE {
            return Err(Error::from(ErrorKind::Eof));
        }

        let signature = le_u32(&data[0..4]);
        if signature != CENTRAL_HEADER_SIGNATURE {
            return Err(Error::from(ErrorKind::InvalidSignature {
                expected: CENTRAL_HEADER_SIGNATURE,
                actual: signature,
            }));
        }

        Ok(ZipFileHeaderFixed {
            version_made_by: le_u16(&data[4..6]),
            version_needed: le_u16(&data[6..8]),
            flags: le_u16(&data[8..10]),
            compression_method: le_u16(&data[10..12]),
            crc32: le_u32(&data[16..20]),
            compressed_size: le_u32(&data[20..24]),
            uncompressed_size: le_u32(&data[24..28]),
            file_name_len: le_u16(&data[28..30]),
            extra_field_len: le_u16(&data[30..32]),
            file_comment_len: le_u16(&data[32..34]),
            external_file_attrs: le_u32(&data[38..42]),
            local_header_offset: le_u32(&data[42..46]),
        })
    }
}
