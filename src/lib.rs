#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]
#![forbid(unsafe_code)]

mod annotate;
mod archive;
mod builder;
mod cleanup;
mod config;
mod errors;
mod mode;
mod packer;
mod patch;
mod pipeline;
mod time;
mod utils;
mod verify;
mod writer;

pub use annotate::{annotate_permissions, mode_for, AnnotateSummary};
pub use archive::{
    CompressionMethod, ZipFileHeaderRecord, ZipSliceArchive, ZipSliceEntries, ZipSliceEntry,
};
pub use builder::{
    macos_executable_path, BuildOutcome, CommandZipBuilder, PatchingZipBuilder, ZipBuilder,
};
pub use cleanup::OriginalBuildOption;
pub use config::{ArchiveConfig, Settings, ZipCreationMethod};
pub use errors::{Error, ErrorKind};
pub use mode::{HostSystem, PosixMode, EXECUTABLE_MASK};
pub use packer::{pack_directory, CompressionLevel, PackSummary};
pub use patch::{
    patch_archive, patch_host_os, PatchReport, CENTRAL_HEADER_FIXED_SIZE,
    CENTRAL_HEADER_SIGNATURE_BYTES, HOST_SYSTEM_OFFSET,
};
pub use pipeline::{archive_path_for, build_archive, ArchiveReport};
pub use time::DosDateTime;
pub use verify::{verify_executable, Verification};
pub use writer::{
    DataDescriptorOutput, ZipArchiveWriter, ZipDataWriter, ZipDirBuilder, ZipEntryWriter,
    ZipFileBuilder, VERSION_NEEDED_DEFAULT,
};
