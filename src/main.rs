use std::process;
use anyhow::Result;
use log::error;

use appma::{app, cli, logging};

fn main() {
    if let Err(e) = run() {
        let error_msg = e.to_string();

        // User errors go to stderr only
        let is_user_error = error_msg.contains("Conflicting log level flags")
            || error_msg.contains("Invalid log")
            || error_msg.contains("requires --log-file")
            || error_msg.contains("Directory does not exist");

        if is_user_error {
            eprintln!("{}", e);
        } else {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
        }
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let root = app::resolve_root(&args)?;
    let settings = app::load_settings(&args, &root)?;
    let log_config = app::configure_logging(&args, &settings)?;
    logging::init_logger(log_config)?;

    // Upgrades run on the manager worker; the runtime only waits for signals
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(app::run_launcher(root, args, settings))
}
