//! unixzip - zip a build directory so its executable stays executable.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use unixzip::{
    archive_path_for, macos_executable_path, BuildOutcome, CommandZipBuilder, CompressionLevel,
    Error, OriginalBuildOption, PatchingZipBuilder, Settings, ZipBuilder, ZipCreationMethod,
};

/// Zip a directory, marking one entry as a Unix executable
#[derive(Parser, Debug)]
#[command(name = "unixzip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to archive. The archive is written next to it as <SOURCE_DIR>.zip
    source_dir: PathBuf,

    /// Entry path of the executable [default: <NAME>/Contents/MacOS/<PRODUCT>]
    #[arg(short, long, value_name = "ENTRY_PATH")]
    executable: Option<String>,

    /// Executable name inside a macOS bundle [default: bundle name without .app]
    #[arg(short, long, value_name = "NAME")]
    product_name: Option<String>,

    /// none, fastest or optimal
    #[arg(short, long)]
    compression: Option<CompressionLevel>,

    /// patch or command
    #[arg(short, long)]
    method: Option<ZipCreationMethod>,

    /// What to do with the source directory afterwards:
    /// keep-original, delete or keep-empty-directory
    #[arg(long)]
    cleanup: Option<OriginalBuildOption>,

    /// JSON settings file, created with defaults if missing
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Seconds the zip command may run
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log every entry
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings, Error> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load_or_create(path)?,
            None => Settings::default(),
        };

        if let Some(compression) = self.compression {
            settings.zip_compression_level = compression;
        }
        if let Some(method) = self.method {
            settings.zip_creation_method = method;
        }
        if let Some(cleanup) = self.cleanup {
            settings.original_build_option = cleanup;
        }
        if let Some(timeout) = self.timeout {
            settings.command_timeout_secs = timeout;
        }
        settings.verbose_logging |= self.verbose;

        Ok(settings)
    }

    fn executable_path(&self) -> String {
        if let Some(path) = &self.executable {
            return path.clone();
        }
        let bundle = bundle_name(&self.source_dir);
        macos_executable_path(&bundle, self.product_name.as_deref())
    }
}

fn bundle_name(source_dir: &Path) -> String {
    std::fs::canonicalize(source_dir)
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| source_dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn run(cli: &Cli, settings: &Settings) -> Result<(), Error> {
    let target = archive_path_for(&cli.source_dir)?;

    let builder: Box<dyn ZipBuilder> = match settings.zip_creation_method {
        ZipCreationMethod::Patch => Box::new(PatchingZipBuilder {
            config: settings.archive_config(),
            executable_path: cli.executable_path(),
        }),
        ZipCreationMethod::Command => Box::new(CommandZipBuilder {
            compression: settings.zip_compression_level,
            timeout: settings.command_timeout(),
        }),
    };

    let outcome = builder.create_zip(&cli.source_dir, &target)?;
    match &outcome {
        BuildOutcome::Patched(report) => {
            if report.is_clean() {
                info!(
                    "{} written with {} entries",
                    report.archive.display(),
                    report.entries()
                );
            } else {
                warn!(
                    "{} written, but its permissions may not survive extraction",
                    report.archive.display()
                );
            }
        }
        BuildOutcome::Command { archive } => info!("{} written", archive.display()),
    }

    settings.original_build_option.apply(&cli.source_dir)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("unixzip: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let default_filter = if settings.verbose_logging {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(&cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
