//! File System Utilities
//!
//! Folder copy/delete, zip extraction and the location of the launcher.

pub mod archive;
pub mod folder;

use std::env;
use std::path::PathBuf;

use crate::core::error::{AppError, AppResult};

pub use archive::Archive;
pub use folder::Folder;

/// Folder containing the running executable
pub fn root_folder() -> AppResult<PathBuf> {
    let executable = env::current_exe().map_err(|e| AppError::io("Could not locate the executable", e))?;
    executable
        .parent()
        .map(|parent| parent.to_path_buf())
        .ok_or_else(|| AppError::configuration(format!("'{}' has no parent folder", executable.display())))
}
