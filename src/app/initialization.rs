//! Launcher initialization: root folder, settings and logging

use std::path::PathBuf;
use std::str::FromStr;
use anyhow::Result;
use log::{debug, LevelFilter};

use crate::config::{ConfigManager, LOGGING_SECTION};
use crate::{cli, logging};

/// Folder of the managed application: `--root`, else the executable's folder
pub fn resolve_root(args: &cli::Args) -> Result<PathBuf> {
    match &args.root {
        Some(root) => Ok(root.canonicalize().unwrap_or_else(|_| root.clone())),
        None => Ok(crate::io::root_folder()?),
    }
}

pub fn load_settings(args: &cli::Args, root: &std::path::Path) -> Result<ConfigManager> {
    match &args.settings {
        Some(settings) => ConfigManager::load_from_file(settings.clone()),
        None => ConfigManager::load(root),
    }
}

/// Logging configuration from the command line, falling back to the `[logging]` settings
pub fn configure_logging(args: &cli::Args, settings: &ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match settings.get_log_level(LOGGING_SECTION, "console-level") {
            Ok(Some(level)) => level,
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in settings, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    let format = match args.log_format.as_deref().or_else(|| settings.get_value(LOGGING_SECTION, "format").map(String::as_str)) {
        Some(format) => logging::LogFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?,
        None => logging::LogFormat::Text,
    };

    let log_file = args.log_file.clone().or_else(|| settings.get_path(LOGGING_SECTION, "file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => settings.get_log_level(LOGGING_SECTION, "file-level")?,
    };

    let (destination, file_level) = match (log_file, file_level) {
        (Some(path), Some(level)) => (logging::LogDestination::Both(path), Some(level)),
        (Some(path), None) => (logging::LogDestination::Both(path), Some(console_level)),
        (None, None) => (logging::LogDestination::Console, None),
        (None, Some(_)) => return Err(anyhow::anyhow!("A log file level was given without a log file")),
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}
