//! Zip Extraction
//!
//! Extraction of patch archives. Directories are created as needed and any
//! entry that cannot be written fails the whole extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use log::debug;

use crate::core::error::{AppError, AppResult};
use crate::task::{Task, TaskControl};

/// A zip archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract every entry under `destination`; returns the number of files written
    pub fn unzip(&self, destination: &Path) -> AppResult<usize> {
        self.extract(destination, None)
    }

    /// Cancelable task extracting the archive, reporting one unit of work per entry
    pub fn unzip_task(self, destination: PathBuf) -> Task<usize> {
        Task::cancelable("unzip", move |control| self.extract(&destination, Some(control)))
    }

    fn extract(&self, destination: &Path, control: Option<&TaskControl>) -> AppResult<usize> {
        let file = File::open(&self.path)
            .map_err(|e| AppError::io(format!("Could not open '{}'", self.path.display()), e))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| AppError::application_with(format!("'{}' is not a valid archive", self.path.display()), e))?;
        create_folder(destination)?;

        let total = archive.len() as i64;
        let mut written = 0;
        for index in 0..archive.len() {
            if let Some(control) = control {
                control.checkpoint()?;
            }
            let mut entry = archive.by_index(index)?;
            let relative = entry.enclosed_name().ok_or_else(|| {
                AppError::application(format!("The archive entry '{}' escapes the destination", entry.name()))
            })?;
            let target = destination.join(relative);

            if entry.is_dir() {
                create_folder(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    create_folder(parent)?;
                }
                let mut output = File::create(&target)
                    .map_err(|e| AppError::io(format!("Could not create '{}'", target.display()), e))?;
                io::copy(&mut entry, &mut output)
                    .map_err(|e| AppError::io(format!("Could not extract '{}'", target.display()), e))?;
                written += 1;
            }

            if let Some(control) = control {
                control.update_progress(index as i64 + 1, total);
            }
        }
        debug!("Extracted {} file(s) from '{}' into '{}'", written, self.path.display(), destination.display());
        Ok(written)
    }
}

fn create_folder(path: &Path) -> AppResult<()> {
    fs::create_dir_all(path).map_err(|e| AppError::io(format!("Could not create the folder '{}'", path.display()), e))
}
