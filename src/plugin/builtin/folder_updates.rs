//! Folder Updates
//!
//! Version manager publishing releases through a local (or mounted) folder.
//! The folder holds a `release.yaml`:
//!
//! ```yaml
//! version: "2.0"
//! archive: demo-2.0.zip
//! ```
//!
//! The archive is the patch: its `app/` folder is copied over the
//! application root, and any classpath named by `target_classpath`
//! becomes the new configuration.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use log::{debug, info};
use serde::Deserialize;

use crate::core::configuration::Configuration;
use crate::core::error::{AppError, AppResult};
use crate::io::Folder;
use crate::plugin::registry::ProviderContext;
use crate::plugin::traits::{Manageable, VersionManager};
use crate::task::Task;

/// Release descriptor expected in the releases folder
pub const RELEASE_FILE: &str = "release.yaml";

const DEFAULT_RELEASES: &str = "releases";
const PATCH_CONTENT: &str = "app";
const CHUNK_SIZE: usize = 64 * 1024;

/// Latest release available in the releases folder
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Release {
    pub version: String,
    /// Patch archive, relative to the releases folder
    pub archive: PathBuf,
}

impl Release {
    pub fn load(releases: &Path) -> AppResult<Self> {
        let path = releases.join(RELEASE_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| AppError::io(format!("Could not read '{}'", path.display()), e))?;
        let release: Release = serde_yaml::from_str(&content)
            .map_err(|e| AppError::configuration(format!("Invalid release '{}': {}", path.display(), e)))?;
        if release.version.trim().is_empty() {
            return Err(AppError::configuration(format!("'{}' declares an empty version", path.display())));
        }
        Ok(release)
    }
}

/// Version manager reading releases from a folder
#[derive(Debug, Clone)]
pub struct FolderUpdates {
    releases: PathBuf,
    applies_to: Vec<String>,
    target_classpath: Vec<String>,
}

impl FolderUpdates {
    pub fn new<P: AsRef<Path>>(releases: P) -> Self {
        Self {
            releases: releases.as_ref().to_path_buf(),
            applies_to: Vec::new(),
            target_classpath: Vec::new(),
        }
    }

    /// Properties: `releases`, `applies_to` and `target_classpath`
    pub fn from_context(context: &ProviderContext) -> AppResult<Self> {
        let releases = context.base_folder().join(context.property("releases").unwrap_or(DEFAULT_RELEASES));
        let target_classpath = context
            .property("target_classpath")
            .map(|value| {
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            releases,
            applies_to: context.list("applies_to"),
            target_classpath,
        })
    }

    pub fn releases(&self) -> &Path {
        &self.releases
    }
}

impl VersionManager for FolderUpdates {
    fn name(&self) -> &str {
        "folder-updates"
    }

    fn supported_types(&self) -> Vec<String> {
        self.applies_to.clone()
    }

    fn check(&self, application: &dyn Manageable) -> AppResult<Task<Option<String>>> {
        let releases = self.releases.clone();
        let current = application.version().to_string();
        Ok(Task::new("check", move |control| {
            control.update_message(format!("Looking for releases in '{}'", releases.display()));
            let release = Release::load(&releases)?;
            if release.version == current {
                debug!("Version {} is the latest one", current);
                Ok(None)
            } else {
                info!("Version {} is available", release.version);
                Ok(Some(release.version))
            }
        }))
    }

    fn store(&self, application: &dyn Manageable, mut sink: Box<dyn Write + Send>) -> AppResult<Task<()>> {
        let releases = self.releases.clone();
        let name = application.name().to_string();
        Ok(Task::cancelable("download", move |control| {
            let release = Release::load(&releases)?;
            let archive = releases.join(&release.archive);
            control.update_message(format!("Downloading {} {}", name, release.version));

            let mut input = File::open(&archive)
                .map_err(|e| AppError::io(format!("Could not open '{}'", archive.display()), e))?;
            let total = input.metadata().map(|metadata| metadata.len() as i64).unwrap_or(-1);
            let mut buffer = vec![0u8; CHUNK_SIZE];
            let mut done = 0i64;
            loop {
                control.checkpoint()?;
                let read = input.read(&mut buffer)?;
                if read == 0 {
                    break;
                }
                sink.write_all(&buffer[..read])?;
                done += read as i64;
                control.update_progress(done, total);
            }
            sink.flush()?;
            Ok(())
        }))
    }

    fn upgrade(&self, patch_root: &Path, app_root: &Path, old_version: &str) -> AppResult<Task<Option<Configuration>>> {
        let content = Folder::new(patch_root.join(PATCH_CONTENT));
        let app_root = app_root.to_path_buf();
        let target_classpath = self.target_classpath.clone();
        let old_version = old_version.to_string();
        Ok(Task::cancelable("upgrade", move |control| {
            control.update_message(format!("Replacing version {}", old_version));
            if content.exists() {
                content.copy_with_progress(&app_root, control)?;
            } else {
                debug!("The patch has no '{}' folder, nothing to copy", PATCH_CONTENT);
            }
            if target_classpath.is_empty() {
                Ok(None)
            } else {
                let classpath = target_classpath.iter().map(|entry| app_root.join(entry)).collect();
                Ok(Some(Configuration::new(classpath)))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tests::mock_providers::MockApplication;
    use std::collections::HashMap;
    use std::sync::Arc;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn publish(releases: &Path, version: &str, payload: &[u8]) {
        fs::create_dir_all(releases).unwrap();
        fs::write(releases.join("patch.zip"), payload).unwrap();
        fs::write(
            releases.join(RELEASE_FILE),
            format!("version: \"{}\"\narchive: patch.zip\n", version),
        )
        .unwrap();
    }

    #[test]
    fn test_from_context_resolves_paths() {
        let dir = tempdir().unwrap();
        let mut properties = HashMap::new();
        properties.insert("releases".to_string(), "published".to_string());
        properties.insert("applies_to".to_string(), "viewer, editor".to_string());
        properties.insert("target_classpath".to_string(), "lib/a.jar; lib/b.jar".to_string());
        let updates = FolderUpdates::from_context(&ProviderContext::new(dir.path(), properties)).unwrap();

        assert_eq!(updates.releases(), dir.path().join("published"));
        assert_eq!(updates.supported_types(), vec!["viewer".to_string(), "editor".to_string()]);
        assert_eq!(updates.target_classpath, vec!["lib/a.jar".to_string(), "lib/b.jar".to_string()]);
    }

    #[test]
    fn test_check_reports_newer_release() {
        let dir = tempdir().unwrap();
        publish(dir.path(), "2.0", b"zip");
        let updates = FolderUpdates::new(dir.path());

        let running = MockApplication::new("demo", "1.0");
        assert_eq!(updates.check(&running).unwrap().execute().unwrap().as_deref(), Some("2.0"));

        let latest = MockApplication::new("demo", "2.0");
        assert_eq!(updates.check(&latest).unwrap().execute().unwrap(), None);
    }

    #[test]
    fn test_check_without_release_fails() {
        let dir = tempdir().unwrap();
        let updates = FolderUpdates::new(dir.path());
        assert!(updates.check(&MockApplication::new("demo", "1.0")).unwrap().execute().is_err());
    }

    #[test]
    fn test_store_copies_archive() {
        let dir = tempdir().unwrap();
        let payload: Vec<u8> = (0..200_000u32).map(|value| value as u8).collect();
        publish(dir.path(), "2.0", &payload);
        let sink = SharedSink::default();

        let updates = FolderUpdates::new(dir.path());
        let task = updates.store(&MockApplication::new("demo", "1.0"), Box::new(sink.clone())).unwrap();
        let handle = task.handle();
        task.execute().unwrap();

        assert_eq!(*sink.0.lock(), payload);
        assert_eq!(handle.work_done(), payload.len() as i64);
        assert_eq!(handle.max(), payload.len() as i64);
    }

    #[test]
    fn test_store_can_be_canceled() {
        let dir = tempdir().unwrap();
        publish(dir.path(), "2.0", b"zip");
        let updates = FolderUpdates::new(dir.path());
        let task = updates.store(&MockApplication::new("demo", "1.0"), Box::new(SharedSink::default())).unwrap();
        task.handle().cancel();
        assert!(task.execute().unwrap_err().is_interrupted());
    }

    #[test]
    fn test_upgrade_copies_patch_content() {
        let patch = tempdir().unwrap();
        let root = tempdir().unwrap();
        fs::create_dir_all(patch.path().join("app/lib")).unwrap();
        fs::write(patch.path().join("app/lib/new.jar"), "new").unwrap();
        fs::write(root.path().join("old.txt"), "old").unwrap();

        let mut updates = FolderUpdates::new(patch.path());
        let configuration = updates.upgrade(patch.path(), root.path(), "1.0").unwrap().execute().unwrap();
        assert!(configuration.is_none());
        assert_eq!(fs::read_to_string(root.path().join("lib/new.jar")).unwrap(), "new");
        assert!(root.path().join("old.txt").exists());

        updates.target_classpath = vec!["lib/new.jar".to_string()];
        let configuration = updates.upgrade(patch.path(), root.path(), "1.0").unwrap().execute().unwrap();
        assert_eq!(configuration.unwrap().classpath(), &[root.path().join("lib/new.jar")]);
    }
}
