//! A conventional zip writer.
//!
//! Like most zip writers, it records every entry as made on a FAT host and
//! fills the external attributes with DOS attribute bits. Unix modes are
//! layered on afterwards by [`annotate`](crate::annotate) and
//! [`patch`](crate::patch).

use crate::{
    archive::{
        CompressionMethod, CENTRAL_HEADER_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE,
        END_OF_CENTRAL_DIR_SIGNATURE, LOCAL_FILE_HEADER_SIGNATURE,
    },
    mode::{HostSystem, MSDOS_DIR},
    time::DosDateTime,
    Error,
};
use std::io::{self, Write};

/// Zip specification version (2.0) written as both "version made by" and
/// "version needed to extract" for every entry.
pub const VERSION_NEEDED_DEFAULT: u16 = 20;

// General purpose bit flags
const FLAG_DATA_DESCRIPTOR: u16 = 0x08; // bit 3: data descriptor present
const FLAG_UTF8_ENCODING: u16 = 0x800; // bit 11: UTF-8 encoding flag (EFS)

// Anything at or above these limits needs zip64, which this writer doesn't
// produce. An entry count of 0xFFFF is itself the zip64 marker.
const MAX_FIELD_SIZE: u64 = u32::MAX as u64;
const MAX_ENTRIES: usize = u16::MAX as usize - 1;

#[derive(Debug)]
struct CountWriter<W> {
    writer: W,
    count: u64,
}

impl<W> CountWriter<W> {
    fn new(writer: W) -> Self {
        CountWriter { writer, count: 0 }
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.count += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Create a new Zip archive.
///
/// ```rust
/// use std::io::Write;
///
/// let mut output = std::io::Cursor::new(Vec::new());
/// let mut archive = unixzip::ZipArchiveWriter::new(&mut output);
/// let mut file = archive.new_file("file.txt").create().unwrap();
/// let mut writer = unixzip::ZipDataWriter::new(&mut file);
/// writer.write_all(b"Hello, world!").unwrap();
/// let (_, output) = writer.finish().unwrap();
/// file.finish(output).unwrap();
/// archive.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct ZipArchiveWriter<W> {
    files: Vec<FileHeader>,
    writer: CountWriter<W>,
}

impl<W> ZipArchiveWriter<W> {
    /// Creates a new `ZipArchiveWriter` that writes to `writer`.
    pub fn new(writer: W) -> Self {
        ZipArchiveWriter {
            writer: CountWriter::new(writer),
            files: Vec::new(),
        }
    }

    /// Number of entries added so far
    pub fn entries(&self) -> usize {
        self.files.len()
    }
}

/// A builder for creating a new file entry in a ZIP archive.
#[derive(Debug)]
pub struct ZipFileBuilder<'a, W> {
    archive: &'a mut ZipArchiveWriter<W>,
    name: &'a str,
    compression_method: CompressionMethod,
    modification_time: DosDateTime,
}

impl<'a, W> ZipFileBuilder<'a, W>
where
    W: Write,
{
    /// Sets the compression method for the file entry.
    ///
    /// The writer only frames the data: when deflating, the caller wraps the
    /// entry writer in an encoder.
    pub fn compression_method(mut self, compression_method: CompressionMethod) -> Self {
        self.compression_method = compression_method;
        self
    }

    /// Sets the modification time for the file entry.
    pub fn last_modified(mut self, modification_time: DosDateTime) -> Self {
        self.modification_time = modification_time;
        self
    }

    /// Creates the file entry and returns a writer for the file's content.
    pub fn create(self) -> Result<ZipEntryWriter<'a, W>, Error> {
        self.archive
            .new_file_with_options(self.name, self.compression_method, self.modification_time)
    }
}

/// A builder for creating a new directory entry in a ZIP archive.
#[derive(Debug)]
pub struct ZipDirBuilder<'a, W> {
    archive: &'a mut ZipArchiveWriter<W>,
    name: &'a str,
    modification_time: DosDateTime,
}

impl<W> ZipDirBuilder<'_, W>
where
    W: Write,
{
    /// Sets the modification time for the directory entry.
    pub fn last_modified(mut self, modification_time: DosDateTime) -> Self {
        self.modification_time = modification_time;
        self
    }

    /// Creates the directory entry.
    pub fn create(self) -> Result<(), Error> {
        self.archive
            .new_dir_with_options(self.name, self.modification_time)
    }
}

impl<W> ZipArchiveWriter<W>
where
    W: Write,
{
    fn write_local_header(
        &mut self,
        name: &str,
        flags: u16,
        compression_method: CompressionMethod,
        modification_time: DosDateTime,
    ) -> Result<(), Error> {
        let (dos_time, dos_date) = modification_time.into_parts();

        self.writer
            .write_all(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes())?;
        self.writer.write_all(&VERSION_NEEDED_DEFAULT.to_le_bytes())?;
        self.writer.write_all(&flags.to_le_bytes())?;
        self.writer
            .write_all(&compression_method.as_id().to_le_bytes())?;
        self.writer.write_all(&dos_time.to_le_bytes())?;
        self.writer.write_all(&dos_date.to_le_bytes())?;

        // crc, compressed and uncompressed size are deferred to the data
        // descriptor (or are all zero for directories)
        self.writer.write_all(&[0u8; 12])?;

        self.writer.write_all(&(name.len() as u16).to_le_bytes())?;
        self.writer.write_all(&0u16.to_le_bytes())?; // Extra field length
        self.writer.write_all(name.as_bytes())?;
        Ok(())
    }

    /// Creates a builder for adding a new directory to the archive.
    ///
    /// The name of the directory must end with a `/`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::io::Cursor;
    /// # let mut output = Cursor::new(Vec::new());
    /// # let mut archive = unixzip::ZipArchiveWriter::new(&mut output);
    /// archive.new_dir("my-dir/").create()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new_dir<'a>(&'a mut self, name: &'a str) -> ZipDirBuilder<'a, W> {
        ZipDirBuilder {
            archive: self,
            name,
            modification_time: DosDateTime::default(),
        }
    }

    fn new_dir_with_options(
        &mut self,
        name: &str,
        modification_time: DosDateTime,
    ) -> Result<(), Error> {
        if !name.ends_with('/') {
            return Err(Error::invalid_input("not a directory"));
        }

        let local_header_offset = self.prepare_entry(name)?;
        let flags = name_flags(name);
        self.write_local_header(name, flags, CompressionMethod::Store, modification_time)?;

        self.files.push(FileHeader {
            name: name.to_string(),
            compression_method: CompressionMethod::Store,
            local_header_offset,
            compressed_size: 0,
            uncompressed_size: 0,
            crc: 0,
            flags,
            modification_time,
            external_attrs: MSDOS_DIR,
        });

        Ok(())
    }

    /// Creates a builder for adding a new file to the archive.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::io::{Cursor, Write};
    /// # let mut output = Cursor::new(Vec::new());
    /// # let mut archive = unixzip::ZipArchiveWriter::new(&mut output);
    /// let mut file = archive.new_file("my-file")
    ///     .compression_method(unixzip::CompressionMethod::Deflate)
    ///     .create()?;
    /// let encoder = flate2::write::DeflateEncoder::new(&mut file, flate2::Compression::fast());
    /// let mut writer = unixzip::ZipDataWriter::new(encoder);
    /// writer.write_all(b"Hello, world!")?;
    /// let (encoder, output) = writer.finish()?;
    /// encoder.finish()?;
    /// file.finish(output)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new_file<'a>(&'a mut self, name: &'a str) -> ZipFileBuilder<'a, W> {
        ZipFileBuilder {
            archive: self,
            name,
            compression_method: CompressionMethod::Store,
            modification_time: DosDateTime::default(),
        }
    }

    fn new_file_with_options<'a>(
        &'a mut self,
        name: &str,
        compression_method: CompressionMethod,
        modification_time: DosDateTime,
    ) -> Result<ZipEntryWriter<'a, W>, Error> {
        let name = name.trim_end_matches('/');
        let local_header_offset = self.prepare_entry(name)?;
        let flags = FLAG_DATA_DESCRIPTOR | name_flags(name);
        self.write_local_header(name, flags, compression_method, modification_time)?;

        Ok(ZipEntryWriter {
            inner: self,
            compressed_bytes: 0,
            header: FileHeader {
                name: name.to_string(),
                compression_method,
                local_header_offset,
                compressed_size: 0,
                uncompressed_size: 0,
                crc: 0,
                flags,
                modification_time,
                external_attrs: 0,
            },
        })
    }

    /// Validates a new entry against the limits of a non-zip64 archive and
    /// returns the offset its local header will be written at.
    fn prepare_entry(&self, name: &str) -> Result<u64, Error> {
        if name.is_empty() || name.contains('\\') || name.starts_with('/') {
            return Err(Error::invalid_input(format!(
                "entry name must be a relative path with forward slashes: {:?}",
                name
            )));
        }

        if name.len() > u16::MAX as usize {
            return Err(Error::invalid_input("entry name too long"));
        }

        if self.files.len() >= MAX_ENTRIES {
            return Err(Error::invalid_input("too many entries for a non-zip64 archive"));
        }

        let offset = self.writer.count();
        if offset >= MAX_FIELD_SIZE {
            return Err(Error::invalid_input("archive too large for a non-zip64 archive"));
        }

        Ok(offset)
    }

    /// Finishes writing the archive and returns the underlying writer.
    ///
    /// This writes the central directory and the end of central directory
    /// record.
    pub fn finish(mut self) -> Result<W, Error>
    where
        W: Write,
    {
        let central_directory_offset = self.writer.count();
        if central_directory_offset >= MAX_FIELD_SIZE {
            return Err(Error::invalid_input("archive too large for a non-zip64 archive"));
        }

        // Always FAT, as conventional writers do
        let version_made_by =
            (u16::from(HostSystem::Fat.as_u8()) << 8) | VERSION_NEEDED_DEFAULT;

        for file in &self.files {
            self.writer
                .write_all(&CENTRAL_HEADER_SIGNATURE.to_le_bytes())?;
            self.writer.write_all(&version_made_by.to_le_bytes())?;
            self.writer.write_all(&VERSION_NEEDED_DEFAULT.to_le_bytes())?;
            self.writer.write_all(&file.flags.to_le_bytes())?;
            self.writer
                .write_all(&file.compression_method.as_id().to_le_bytes())?;

            let (dos_time, dos_date) = file.modification_time.into_parts();
            self.writer.write_all(&dos_time.to_le_bytes())?;
            self.writer.write_all(&dos_date.to_le_bytes())?;

            self.writer.write_all(&file.crc.to_le_bytes())?;
            self.writer
                .write_all(&(file.compressed_size as u32).to_le_bytes())?;
            self.writer
                .write_all(&(file.uncompressed_size as u32).to_le_bytes())?;
            self.writer
                .write_all(&(file.name.len() as u16).to_le_bytes())?;

            // Extra field length, file comment length
            self.writer.write_all(&[0u8; 4])?;

            // Disk number start, internal file attributes
            self.writer.write_all(&[0u8; 4])?;

            self.writer.write_all(&file.external_attrs.to_le_bytes())?;
            self.writer
                .write_all(&(file.local_header_offset as u32).to_le_bytes())?;
            self.writer.write_all(file.name.as_bytes())?;
        }

        let central_directory_size = self.writer.count() - central_directory_offset;
        let entries_count = self.files.len() as u16;

        self.writer
            .write_all(&END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes())?;

        // Disk numbers
        self.writer.write_all(&[0u8; 4])?;

        self.writer.write_all(&entries_count.to_le_bytes())?;
        self.writer.write_all(&entries_count.to_le_bytes())?;
        self.writer
            .write_all(&(central_directory_size as u32).to_le_bytes())?;
        self.writer
            .write_all(&(central_directory_offset as u32).to_le_bytes())?;

        // Comment length
        self.writer.write_all(&0u16.to_le_bytes())?;

        self.writer.flush()?;
        Ok(self.writer.writer)
    }
}

fn name_flags(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        FLAG_UTF8_ENCODING
    }
}

/// A writer for a file in a ZIP archive.
///
/// This writer is created by `ZipArchiveWriter::new_file`. Data written to
/// this writer is passed through to the archive as is (ie: already
/// compressed).
///
/// After writing all data, call `finish` to complete the entry.
#[derive(Debug)]
pub struct ZipEntryWriter<'a, W> {
    inner: &'a mut ZipArchiveWriter<W>,
    compressed_bytes: u64,
    header: FileHeader,
}

impl<W> ZipEntryWriter<'_, W> {
    /// Finishes writing the file entry.
    ///
    /// This writes the data descriptor and adds the file entry to the central
    /// directory.
    pub fn finish(self, output: DataDescriptorOutput) -> Result<u64, Error>
    where
        W: Write,
    {
        if self.compressed_bytes >= MAX_FIELD_SIZE || output.uncompressed_size >= MAX_FIELD_SIZE {
            return Err(Error::invalid_input(format!(
                "{} is too large for a non-zip64 archive",
                self.header.name
            )));
        }

        let writer = &mut self.inner.writer;
        writer.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
        writer.write_all(&output.crc.to_le_bytes())?;
        writer.write_all(&(self.compressed_bytes as u32).to_le_bytes())?;
        writer.write_all(&(output.uncompressed_size as u32).to_le_bytes())?;

        let header = FileHeader {
            compressed_size: self.compressed_bytes,
            uncompressed_size: output.uncompressed_size,
            crc: output.crc,
            ..self.header
        };
        self.inner.files.push(header);

        Ok(self.compressed_bytes)
    }
}

impl<W> Write for ZipEntryWriter<'_, W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.inner.writer.write(buf)?;
        self.compressed_bytes += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.writer.flush()
    }
}

/// A writer for the uncompressed data of a Zip file entry.
///
/// This writer will keep track of the data necessary to write the data
/// descriptor (ie: number of bytes written and the CRC32 checksum).
///
/// Once all the data has been written, invoke the `finish` method to receive
/// the `DataDescriptorOutput` necessary to finalize the entry.
pub struct ZipDataWriter<W> {
    inner: W,
    uncompressed_bytes: u64,
    hasher: crc32fast::Hasher,
}

impl<W> ZipDataWriter<W> {
    /// Creates a new `ZipDataWriter` that writes to an underlying writer.
    pub fn new(inner: W) -> Self {
        ZipDataWriter {
            inner,
            uncompressed_bytes: 0,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// Consumes self and returns the inner writer and the data descriptor to
    /// be passed to a `ZipEntryWriter`.
    ///
    /// The writer is returned so that a compressor can be told no more data
    /// will be written and emit its epilogue.
    pub fn finish(mut self) -> Result<(W, DataDescriptorOutput), Error>
    where
        W: Write,
    {
        self.flush()?;
        let output = DataDescriptorOutput {
            crc: self.hasher.finalize(),
            uncompressed_size: self.uncompressed_bytes,
        };

        Ok((self.inner, output))
    }
}

impl<W> Write for ZipDataWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.inner.write(buf)?;
        self.uncompressed_bytes += bytes_written as u64;
        self.hasher.update(&buf[..bytes_written]);
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Contains information written in the data descriptor after the file data.
#[derive(Debug, Clone)]
pub struct DataDescriptorOutput {
    crc: u32,
    uncompressed_size: u64,
}

impl DataDescriptorOutput {
    /// Returns the CRC32 checksum of the uncompressed data.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Returns the uncompressed size of the data.
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }
}

#[derive(Debug)]
struct FileHeader {
    name: String,
    compression_method: CompressionMethod,
    local_header_offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    crc: u32,
    flags: u16,
    modification_time: DosDateTime,
    external_attrs: u32,
}
