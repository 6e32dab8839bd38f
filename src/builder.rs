//! The two ways an archive can be produced.
//!
//! [`PatchingZipBuilder`] writes the archive itself and patches in the Unix
//! permissions. [`CommandZipBuilder`] hands the job to an Info-ZIP `zip`
//! binary, which records Unix hosts and modes on its own.

use crate::config::ArchiveConfig;
use crate::packer::CompressionLevel;
use crate::pipeline::{build_archive, ArchiveReport};
use crate::{Error, ErrorKind};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const ZIP_TOOL: &str = "zip";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a builder produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Built in process, with the full pipeline report
    Patched(ArchiveReport),

    /// Built by the system `zip` command
    Command { archive: PathBuf },
}

impl BuildOutcome {
    pub fn archive(&self) -> &Path {
        match self {
            BuildOutcome::Patched(report) => &report.archive,
            BuildOutcome::Command { archive } => archive,
        }
    }
}

pub trait ZipBuilder {
    /// Archives `source_dir` into `target`, replacing any existing file.
    fn create_zip(&self, source_dir: &Path, target: &Path) -> Result<BuildOutcome, Error>;
}

/// Builds archives in process and patches them so the executable keeps its
/// permissions.
#[derive(Debug, Clone)]
pub struct PatchingZipBuilder {
    pub config: ArchiveConfig,

    /// Entry path of the executable, including the source directory's name
    pub executable_path: String,
}

impl ZipBuilder for PatchingZipBuilder {
    fn create_zip(&self, source_dir: &Path, target: &Path) -> Result<BuildOutcome, Error> {
        let config = ArchiveConfig {
            target: Some(target.to_path_buf()),
            ..self.config.clone()
        };
        let report = build_archive(&config, source_dir, &self.executable_path)?;
        Ok(BuildOutcome::Patched(report))
    }
}

/// Builds archives by running `zip -r` in the source directory's parent.
#[derive(Debug, Clone)]
pub struct CommandZipBuilder {
    pub compression: CompressionLevel,

    /// How long `zip` may run before it is killed
    pub timeout: Duration,
}

impl CommandZipBuilder {
    /// Whether a `zip` binary can be run at all
    pub fn is_available() -> bool {
        Command::new(ZIP_TOOL)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run(&self, mut command: Command) -> Result<(), Error> {
        // Output goes to files rather than pipes so a chatty process can't
        // block on a full pipe while we poll it.
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        command
            .stdin(Stdio::null())
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?);

        debug!("running {:?}", command);
        let mut child = command.spawn()?;
        let status = wait_with_timeout(&mut child, self.timeout);

        log_output(&mut stdout, false)?;
        log_output(&mut stderr, true)?;

        match status? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(Error::from(ErrorKind::CommandFailed { status })),
            None => Err(Error::from(ErrorKind::CommandTimedOut {
                secs: self.timeout.as_secs(),
            })),
        }
    }
}

impl ZipBuilder for CommandZipBuilder {
    fn create_zip(&self, source_dir: &Path, target: &Path) -> Result<BuildOutcome, Error> {
        if !CommandZipBuilder::is_available() {
            return Err(Error::from(ErrorKind::ToolUnavailable {
                tool: ZIP_TOOL.to_string(),
            }));
        }

        let source = match fs::canonicalize(source_dir) {
            Ok(source) if source.is_dir() => source,
            Ok(_) => {
                return Err(Error::from(ErrorKind::NotADirectory {
                    path: source_dir.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::from(ErrorKind::MissingSourceDirectory {
                    path: source_dir.to_path_buf(),
                }))
            }
            Err(e) => return Err(Error::io(e)),
        };
        let (parent, name) = match (source.parent(), source.file_name()) {
            (Some(parent), Some(name)) => (parent, name),
            _ => {
                return Err(Error::invalid_input(format!(
                    "can't archive {} by name",
                    source.display()
                )))
            }
        };

        // zip resolves the target relative to the directory it runs in
        let target = if target.is_absolute() {
            target.to_path_buf()
        } else {
            std::env::current_dir()?.join(target)
        };

        // zip would otherwise add to the stale archive
        match fs::remove_file(&target) {
            Ok(()) => debug!("removed stale archive {}", target.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(e)),
        }

        info!(
            "running {} on {} ({:?})",
            ZIP_TOOL,
            source.display(),
            self.compression
        );
        let mut command = Command::new(ZIP_TOOL);
        command
            .current_dir(parent)
            .arg(format!("-{}", self.compression.zip_level()))
            .arg("-r")
            .arg(&target)
            .arg(name);
        self.run(command)?;

        info!("zip created at {}", target.display());
        Ok(BuildOutcome::Command { archive: target })
    }
}

/// Waits for `child` to exit. Returns `None` if it had to be killed after
/// outliving `timeout`.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, Error> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            warn!("process {} timed out, killing it", child.id());
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn log_output(file: &mut File, is_stderr: bool) -> Result<(), Error> {
    file.seek(SeekFrom::Start(0))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if is_stderr {
            warn!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
    Ok(())
}

/// The entry path of a macOS bundle's executable.
///
/// Without a product name, the executable is named after the bundle minus its
/// `.app` extension.
pub fn macos_executable_path(bundle_name: &str, product_name: Option<&str>) -> String {
    let bundle_name = bundle_name.trim_end_matches('/');
    let product = match product_name {
        Some(product) => product,
        None => bundle_name.strip_suffix(".app").unwrap_or(bundle_name),
    };
    format!("{}/Contents/MacOS/{}", bundle_name, product)
}
