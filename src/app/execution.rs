//! Launcher execution: boot the managed application and wait for the exit

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::Notify;

use crate::cli;
use crate::config::ConfigManager;
use crate::core::{AppError, ApplicationManager, HeadlessHost, UpgradeOutcome};
use crate::plugin::ProviderRegistry;

/// Build the manager of the application installed in `root`
pub fn build_manager(
    root: PathBuf,
    args: &cli::Args,
    settings: &ConfigManager,
    host: Arc<HeadlessHost>,
) -> Result<ApplicationManager> {
    let registry = Arc::new(ProviderRegistry::with_builtins());
    let launcher = settings.launcher_settings();

    let mut builder = ApplicationManager::builder(&root, registry)
        .arguments(args.arguments.iter().cloned())
        .host(host);
    if let Some(name) = launcher.configuration_name {
        builder = builder.configuration_name(name);
    }
    if let Some(patch_file) = launcher.patch_file {
        builder = builder.patch_file(patch_file);
    }
    if let Some(staging_folder) = launcher.staging_folder {
        builder = builder.staging_folder(staging_folder);
    }
    builder
        .build()
        .with_context(|| format!("Failed to load the application installed in '{}'", root.display()))
}

/// Create and start the application, run the requested update actions, then wait for the exit
pub async fn run_launcher(root: PathBuf, args: cli::Args, settings: ConfigManager) -> Result<()> {
    let exit_signal = Arc::new(Notify::new());
    let host = Arc::new(HeadlessHost::with_exit_signal(Arc::clone(&exit_signal)));
    let manager = build_manager(root, &args, &settings, host)?;

    let application = manager.create()?;
    info!("Starting {} {}", application.name(), application.version());
    if application.is_graphical() {
        let facade = manager.facade();
        manager.init_async(Some(Box::new(move |_: &AppError| facade.on_exit())))?;
    } else {
        manager.init_and_show()?;
    }
    drop(application);

    if args.check_update {
        check_for_update(&manager).await;
    }
    if args.upgrade {
        upgrade(&manager).await;
    }

    wait_for_exit(&manager, &exit_signal).await;

    let closing = manager.clone();
    tokio::task::spawn_blocking(move || {
        closing.on_exit();
        closing.join();
    })
    .await
    .context("The shutdown did not complete")?;
    info!("Bye");
    Ok(())
}

async fn check_for_update(manager: &ApplicationManager) {
    let task = match manager.check_for_update() {
        Ok(task) => task,
        Err(_) => return,
    };
    match tokio::task::spawn_blocking(move || task.execute()).await {
        Ok(Ok(Some(version))) => info!("Version {} is available", version),
        Ok(Ok(None)) => info!("The application is up to date"),
        Ok(Err(e)) => error!("Could not check for update: {}", e),
        Err(e) => error!("The update check did not complete: {}", e),
    }
}

async fn upgrade(manager: &ApplicationManager) {
    let future = match manager.upgrade() {
        Ok(future) => future,
        Err(e) => {
            error!("Could not upgrade: {}", e);
            return;
        }
    };
    match tokio::task::spawn_blocking(move || future.wait()).await {
        Ok(Ok(Ok(UpgradeOutcome::Upgraded { from, to }))) => info!("Upgraded from {} to {}", from, to),
        Ok(Ok(Ok(UpgradeOutcome::Abandoned))) => warn!("The upgrade has been abandoned"),
        // Already logged by the manager, which asked for the exit
        Ok(Ok(Err(_))) => {}
        Ok(Err(e)) => error!("The upgrade failed unexpectedly: {}", e),
        Err(e) => error!("The upgrade did not complete: {}", e),
    }
}

/// Wait for Ctrl-C or an exit request; Ctrl-C honours the application exit predicate
async fn wait_for_exit(manager: &ApplicationManager, exit_signal: &Notify) {
    loop {
        tokio::select! {
            _ = exit_signal.notified() => return,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Could not listen for Ctrl-C: {}", e);
                    exit_signal.notified().await;
                    return;
                }
                if manager.confirm_exit() {
                    return;
                }
                info!("The application refused to exit");
            }
        }
    }
}
