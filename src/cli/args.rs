use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use log::debug;

/// Desktop application launcher with in-place upgrades
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "appma")]
#[command(about = "Launch a managed application and keep it up to date")]
#[command(version)]
pub struct Args {
    /// Folder the managed application is installed in (defaults to the executable's folder)
    #[arg(short = 'r', long = "root", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Launcher settings file
    #[arg(long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Check for a newer version once the application is running
    #[arg(long)]
    pub check_update: bool,

    /// Upgrade the application once it is running
    #[arg(long)]
    pub upgrade: bool,

    /// Arguments handed to the managed application
    #[arg(last = true, value_name = "ARGS")]
    pub arguments: Vec<String>,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug].iter().filter(|&&flag| flag).count();
    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        match format.to_lowercase().as_str() {
            "text" | "json" => {}
            _ => return Err(anyhow::anyhow!("Invalid log format '{}'. Valid options: text, json", format)),
        }
    }

    if let Some(level) = &args.log_file_level {
        crate::logging::parse_log_level(level)?;
        if args.log_file.is_none() {
            return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
        }
    }

    if let Some(root) = &args.root {
        if !root.is_dir() {
            return Err(anyhow::anyhow!("Directory does not exist: {}", root.display()));
        }
    }
    Ok(())
}
