//! Built-in Providers
//!
//! Providers every launcher registers: a console application and a
//! version manager reading releases from a local folder.

pub mod console;
pub mod folder_updates;

use std::sync::Arc;

use crate::plugin::registry::ProviderRegistry;
use crate::plugin::traits::VersionManager;

pub use console::ConsoleApplication;
pub use folder_updates::{FolderUpdates, Release, RELEASE_FILE};

/// Names of the built-in application providers
pub const BUILTIN_APPLICATIONS: [&str; 1] = ["console"];

/// Names of the built-in version manager providers
pub const BUILTIN_VERSION_MANAGERS: [&str; 1] = ["folder-updates"];

/// Register the built-in providers; names already taken are skipped
pub fn register(registry: &mut ProviderRegistry) {
    if let Err(e) = registry.register_application("console", |context| {
        Ok(ConsoleApplication::from_context(context)?.into_arc())
    }) {
        log::warn!("{}", e);
    }
    if let Err(e) = registry.register_version_manager("folder-updates", |context| {
        let manager: Arc<dyn VersionManager> = Arc::new(FolderUpdates::from_context(context)?);
        Ok(manager)
    }) {
        log::warn!("{}", e);
    }
}
