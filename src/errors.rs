use std::path::PathBuf;

#[derive(Debug)]
pub struct Error {
    inner: ErrorInner,
}

impl Error {
    pub(crate) fn io(err: std::io::Error) -> Error {
        Error::from(ErrorKind::IO(err))
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Error {
        Error::from(ErrorKind::InvalidInput { msg: msg.into() })
    }

    /// The kind of error that occurred
    pub fn kind(&self) -> &ErrorKind {
        &self.inner.kind
    }
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
}

/// The different errors that can arise while building or inspecting an
/// archive.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The directory to archive does not exist
    MissingSourceDirectory { path: PathBuf },

    /// The path to archive exists but is not a directory
    NotADirectory { path: PathBuf },

    /// The input can't be represented in the archive (eg: a zip64 archive
    /// would be required)
    InvalidInput { msg: String },

    /// No end of central directory record was found
    MissingEndOfCentralDirectory,

    /// A record did not start with its expected signature
    InvalidSignature { expected: u32, actual: u32 },

    /// Decompressed data doesn't match the recorded checksum
    InvalidChecksum { expected: u32, actual: u32 },

    /// Decompressed data doesn't match the recorded size
    InvalidSize { expected: u64, actual: u64 },

    /// Settings could not be parsed or serialized
    Config(serde_json::Error),

    /// A required external tool is not installed
    ToolUnavailable { tool: String },

    /// An external command exited unsuccessfully
    CommandFailed { status: std::process::ExitStatus },

    /// An external command was killed after exceeding its timeout
    CommandTimedOut { secs: u64 },

    /// An underlying I/O error
    IO(std::io::Error),

    /// Unexpected end of data
    Eof,
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.inner.kind {
            ErrorKind::IO(ref err) => Some(err),
            ErrorKind::Config(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.inner.kind)?;
        Ok(())
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ErrorKind::IO(ref err) => err.fmt(f),
            ErrorKind::MissingSourceDirectory { ref path } => {
                write!(f, "Source directory does not exist: {}", path.display())
            }
            ErrorKind::NotADirectory { ref path } => {
                write!(f, "Source path is not a directory: {}", path.display())
            }
            ErrorKind::InvalidInput { ref msg } => {
                write!(f, "Invalid input: {}", msg)
            }
            ErrorKind::MissingEndOfCentralDirectory => {
                write!(f, "Missing end of central directory")
            }
            ErrorKind::InvalidSignature { expected, actual } => {
                write!(
                    f,
                    "Invalid signature: expected 0x{:08x}, got 0x{:08x}",
                    expected, actual
                )
            }
            ErrorKind::InvalidChecksum { expected, actual } => {
                write!(
                    f,
                    "Invalid checksum: expected 0x{:08x}, got 0x{:08x}",
                    expected, actual
                )
            }
            ErrorKind::InvalidSize { expected, actual } => {
                write!(f, "Invalid size: expected {}, got {}", expected, actual)
            }
            ErrorKind::Config(ref err) => {
                write!(f, "Invalid settings: {}", err)
            }
            ErrorKind::ToolUnavailable { ref tool } => {
                write!(f, "Required tool is not installed: {}", tool)
            }
            ErrorKind::CommandFailed { status } => {
                write!(f, "Command failed: {}", status)
            }
            ErrorKind::CommandTimedOut { secs } => {
                write!(f, "Command timed out after {} seconds", secs)
            }
            ErrorKind::Eof => {
                write!(f, "Unexpected end of file")
            }
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: ErrorInner { kind },
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(ErrorKind::Config(err))
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::io(std::io::Error::from(err))
    }
}
