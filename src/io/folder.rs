//! Folder Utilities
//!
//! Recursive copy and best-effort recursive delete.

use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::core::error::{AppError, AppResult};
use crate::task::TaskControl;

/// A folder on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    path: PathBuf,
}

impl Folder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Delete the folder and its content.
    ///
    /// Returns whether the folder is gone; failures are logged, never raised.
    pub fn delete(&self) -> bool {
        if !self.path.exists() {
            return true;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!("Deleted '{}'", self.path.display());
                true
            }
            Err(e) => {
                warn!("Could not delete '{}': {}", self.path.display(), e);
                false
            }
        }
    }

    /// Copy the content of the folder into `destination`, overwriting existing files.
    ///
    /// Returns the number of files copied.
    pub fn copy_to(&self, destination: &Path) -> AppResult<usize> {
        self.copy(destination, None)
    }

    /// Same as [`Folder::copy_to`], reporting progress to and honouring cancellation of a task
    pub fn copy_with_progress(&self, destination: &Path, control: &TaskControl) -> AppResult<usize> {
        self.copy(destination, Some(control))
    }

    fn copy(&self, destination: &Path, control: Option<&TaskControl>) -> AppResult<usize> {
        if !self.exists() {
            return Err(AppError::io(
                format!("Could not copy '{}'", self.path.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a folder"),
            ));
        }

        let entries: Vec<walkdir::DirEntry> = WalkDir::new(&self.path)
            .min_depth(1)
            .into_iter()
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::application_with(format!("Could not list '{}'", self.path.display()), e))?;
        let total = entries.len() as i64;

        fs::create_dir_all(destination)
            .map_err(|e| AppError::io(format!("Could not create '{}'", destination.display()), e))?;

        let mut copied = 0;
        for (index, entry) in entries.iter().enumerate() {
            if let Some(control) = control {
                control.checkpoint()?;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.path)
                .map_err(|e| AppError::application_with("Could not compute a relative path", e))?;
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| AppError::io(format!("Could not create '{}'", target.display()), e))?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .map_err(|e| AppError::io(format!("Could not create '{}'", parent.display()), e))?;
                }
                fs::copy(entry.path(), &target).map_err(|e| {
                    AppError::io(format!("Could not copy '{}' to '{}'", entry.path().display(), target.display()), e)
                })?;
                copied += 1;
            }

            if let Some(control) = control {
                control.update_progress(index as i64 + 1, total);
            }
        }
        debug!("Copied {} file(s) from '{}' to '{}'", copied, self.path.display(), destination.display());
        Ok(copied)
    }
}
