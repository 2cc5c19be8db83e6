//! Command-line entry point: `gitfs <mountpoint> [--root <path>] [--debug] [--fuse-debug]`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use gitfs::fuse::GitFs;
use gitfs::types::MountConfig;

/// Expose a git repository (or a directory tree of them) as a read-only FUSE filesystem.
#[derive(Debug, Parser)]
#[command(name = "gitfs", version, about)]
struct Cli {
    /// Directory to mount the filesystem onto. Must already exist.
    mountpoint: PathBuf,

    /// Directory containing the repository/repositories to expose.
    #[arg(short, long, env = "GITFS_ROOT", default_value = ".")]
    root: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long)]
    debug: bool,

    /// Also surface fuser's own session-level debug output in the log
    /// stream. Only takes effect alongside --debug; the overall log level
    /// still gates what gets printed.
    #[arg(short = 'D', long)]
    fuse_debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // --fuse-debug only widens the `fuser` target's own verbosity; it never
    // raises the overall level on its own (mirrors legitfs's cli.py, where
    // --fuse-debug just decides whether libfuse's diagnostics are routed
    // into the same log stream, and the shared level still gates them).
    let fuser_level = if cli.debug && cli.fuse_debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .filter_module("fuser", fuser_level)
        .init();

    if let Err(e) = validate_dir(&cli.mountpoint) {
        error!("mountpoint {}: {}", cli.mountpoint.display(), e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = validate_dir(&cli.root) {
        error!("root {}: {}", cli.root.display(), e);
        return ExitCode::FAILURE;
    }

    let config = MountConfig {
        root: cli.root,
        mountpoint: cli.mountpoint.clone(),
        debug: cli.debug,
        fuse_debug: cli.fuse_debug,
    };

    let fs = match GitFs::new(config) {
        Ok(fs) => fs,
        Err(e) => {
            error!("failed to initialize filesystem: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = vec![
        fuser::MountOption::RO,
        fuser::MountOption::FSName("gitfs".to_string()),
    ];

    match fuser::mount2(fs, &cli.mountpoint, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("mount failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate_dir(path: &std::path::Path) -> std::io::Result<()> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not a directory",
        ));
    }
    Ok(())
}
