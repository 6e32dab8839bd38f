/// Host system recorded in the high byte of a central directory header's
/// "version made by" field.
///
/// APPNOTE.TXT section 4.4.2.2. Only the two hosts this crate
/// deals with are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSystem {
    /// MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems). External
    /// attributes hold DOS attribute bits.
    Fat,

    /// Unix. The high 16 bits of the external attributes hold a POSIX mode.
    Unix,

    /// Any other host
    Other(u8),
}

impl HostSystem {
    pub const fn as_u8(&self) -> u8 {
        match *self {
            HostSystem::Fat => CREATOR_FAT,
            HostSystem::Unix => CREATOR_UNIX,
            HostSystem::Other(x) => x,
        }
    }
}

impl From<u8> for HostSystem {
    fn from(value: u8) -> Self {
        match value {
            CREATOR_FAT => HostSystem::Fat,
            CREATOR_UNIX => HostSystem::Unix,
            x => HostSystem::Other(x),
        }
    }
}

pub(crate) const CREATOR_FAT: u8 = 0;
pub(crate) const CREATOR_UNIX: u8 = 3;

/// A POSIX file mode (permission and file type bits) as stored in the high
/// 16 bits of a zip entry's external attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PosixMode(u16);

impl PosixMode {
    /// `rw-r--r--` regular file. Applied to every entry that isn't the
    /// designated executable or a directory.
    pub const DEFAULT: PosixMode = PosixMode((S_IFREG | 0o644) as u16);

    /// `rwxrwxrwx` regular file. Applied to the designated executable.
    ///
    /// Grants write and execute to group and other. Kept bit-for-bit with
    /// archives produced by earlier tooling; a candidate for tightening to
    /// `0o100755`.
    pub const EXECUTABLE: PosixMode = PosixMode((S_IFREG | 0o777) as u16);

    /// `rwxr-xr-x` directory.
    pub const DIRECTORY: PosixMode = PosixMode((S_IFDIR | 0o755) as u16);

    /// Returns the raw mode value
    pub const fn value(&self) -> u32 {
        self.0 as u32
    }

    /// Returns the Unix permission bits (e.g., 0o755).
    pub const fn permissions(&self) -> u32 {
        self.0 as u32 & 0o777
    }

    pub const fn is_dir(&self) -> bool {
        self.0 as u32 & S_IFMT == S_IFDIR
    }

    /// The mode shifted into the position it occupies within the external
    /// attributes.
    pub const fn as_external_attributes(&self) -> u32 {
        (self.0 as u32) << 16
    }

    /// Extracts the mode from external attributes. Only meaningful when the
    /// entry was made on a Unix host.
    pub const fn from_external_attributes(attrs: u32) -> Self {
        Self((attrs >> 16) as u16)
    }
}

impl std::fmt::Display for PosixMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0o{:06o}", self.0)
    }
}

/// Bit pattern every designated executable's external attributes must
/// contain.
pub const EXECUTABLE_MASK: u32 = PosixMode::EXECUTABLE.as_external_attributes();

/// Unix file type and permission constants
const S_IFMT: u32 = 0o170000; // File type mask
const S_IFREG: u32 = 0o100000; // Regular file
const S_IFDIR: u32 = 0o040000; // Directory

/// MSDOS file attribute constants
pub(crate) const MSDOS_DIR: u32 = 0x10;
