//! Classpath Configuration
//!
//! The ordered list of locations a managed application and its version
//! managers are loaded from, and the factory that finds it on disk.

use std::collections::HashMap;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Component, Path, PathBuf};
use log::{debug, info};

use crate::core::error::{AppError, AppResult};

/// Default name of the configuration file looked up in the application folder
pub const DEFAULT_CONFIGURATION_NAME: &str = "appma.properties";

/// Environment variable overriding the configuration file name
pub const CONFIGURATION_NAME_ENV: &str = "APPMA_CONFIGURATION_NAME";

/// The only key recognized in the configuration file
pub const CLASSPATH_KEY: &str = "classpath";

const CLASSPATH_SEPARATOR: char = ';';
const ARCHIVE_EXTENSION: &str = "jar";

/// Name of the configuration file, honouring the environment override
pub fn configuration_name() -> String {
    env::var(CONFIGURATION_NAME_ENV)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIGURATION_NAME.to_string())
}

/// Immutable classpath description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    classpath: Vec<PathBuf>,
}

impl Configuration {
    pub fn new(classpath: Vec<PathBuf>) -> Self {
        Self { classpath }
    }

    /// Build the classpath from the `classpath` property, each entry relative to `parent_folder`
    pub fn from_properties(parent_folder: &Path, properties: &HashMap<String, String>) -> Self {
        let classpath = properties
            .get(CLASSPATH_KEY)
            .map(|value| {
                value
                    .split(CLASSPATH_SEPARATOR)
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| parent_folder.join(segment))
                    .collect()
            })
            .unwrap_or_default();
        Self { classpath }
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    pub fn is_empty(&self) -> bool {
        self.classpath.is_empty()
    }

    /// Validate every entry and return them as absolute paths.
    ///
    /// An entry must exist and be readable: directories are listed and
    /// files have their first byte read.
    pub fn resolve_classpath(&self) -> AppResult<Vec<PathBuf>> {
        self.classpath.iter().map(|entry| resolve_entry(entry)).collect()
    }

    /// Persist the classpath into `target`, relative to the folder containing it.
    ///
    /// An empty configuration leaves `target` untouched.
    pub fn store(&self, target: &Path) -> AppResult<()> {
        if self.classpath.is_empty() {
            return Ok(());
        }
        let target = absolute(target)?;
        let parent = target
            .parent()
            .ok_or_else(|| AppError::configuration(format!("'{}' has no parent folder", target.display())))?;

        let mut entries = Vec::with_capacity(self.classpath.len());
        for entry in &self.classpath {
            let entry = absolute(entry)?;
            entries.push(relativize(parent, &entry).to_string_lossy().into_owned());
        }

        let mut properties = HashMap::new();
        properties.insert(CLASSPATH_KEY.to_string(), entries.join(&CLASSPATH_SEPARATOR.to_string()));

        let file = File::create(&target)
            .map_err(|e| AppError::io(format!("Could not create '{}'", target.display()), e))?;
        java_properties::write(BufWriter::new(file), &properties)?;
        debug!("Stored the classpath into '{}'", target.display());
        Ok(())
    }
}

/// Locates the configuration of an application folder
#[derive(Debug, Clone)]
pub struct ConfigurationFactory {
    folder: PathBuf,
    name: String,
}

impl ConfigurationFactory {
    /// Factory using the configuration file name from the environment
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self::with_name(folder, configuration_name())
    }

    pub fn with_name<P: AsRef<Path>, S: Into<String>>(folder: P, name: S) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            name: name.into(),
        }
    }

    pub fn configuration_file(&self) -> PathBuf {
        self.folder.join(&self.name)
    }

    /// Resolve the configuration of the folder.
    ///
    /// Precedence: the configuration file, then every `*.jar` directly in
    /// the folder, then the folder itself.
    pub fn create(&self) -> AppResult<Configuration> {
        let config_file = self.configuration_file();
        if config_file.exists() {
            info!("The configuration could be found at '{}'", config_file.display());
            let file = File::open(&config_file).map_err(|e| {
                AppError::io(format!("Could not load the configuration from '{}'", config_file.display()), e)
            })?;
            let properties = java_properties::read(BufReader::new(file)).map_err(|e| {
                AppError::configuration(format!(
                    "Could not load the configuration from '{}': {}",
                    config_file.display(),
                    e
                ))
            })?;
            let config = Configuration::from_properties(&self.folder, &properties);
            if config.is_empty() {
                return Err(AppError::configuration(format!(
                    "No classpath defined in '{}'",
                    config_file.display()
                )));
            }
            return Ok(config);
        }

        info!("No configuration could be found using the directory '{}'", self.folder.display());
        let mut archives = self.list_archives()?;
        if archives.is_empty() {
            Ok(Configuration::new(vec![self.folder.clone()]))
        } else {
            archives.sort();
            Ok(Configuration::new(archives))
        }
    }

    fn list_archives(&self) -> AppResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Could not list '{}': {}", self.folder.display(), e);
                return Ok(Vec::new());
            }
        };
        let mut archives = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_archive = path.extension().and_then(|ext| ext.to_str()) == Some(ARCHIVE_EXTENSION);
            if is_archive && path.is_file() {
                archives.push(path);
            }
        }
        Ok(archives)
    }
}

fn resolve_entry(entry: &Path) -> AppResult<PathBuf> {
    let path = absolute(entry)?;
    if !path.exists() {
        return Err(AppError::configuration(format!("The path '{}' doesn't exist", path.display())));
    }
    let probe = if path.is_dir() {
        fs::read_dir(&path).map(|_| ())
    } else {
        File::open(&path).and_then(|mut file| {
            let mut byte = [0u8; 1];
            file.read(&mut byte).map(|_| ())
        })
    };
    probe.map_err(|e| AppError::configuration(format!("Could not access to '{}': {}", path.display(), e)))?;
    Ok(path)
}

fn absolute(path: &Path) -> AppResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| AppError::io(format!("Could not resolve '{}'", path.display()), e))
}

/// Lexically remove `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Path of `target` relative to `base`; both are expected to be absolute
pub(crate) fn relativize(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);
    let base_components: Vec<Component> = base.components().collect();
    let target_components: Vec<Component> = target.components().collect();

    let common = base_components
        .iter()
        .zip(target_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &target_components[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn factory(folder: &Path) -> ConfigurationFactory {
        ConfigurationFactory::with_name(folder, DEFAULT_CONFIGURATION_NAME)
    }

    #[test]
    fn test_relativize() {
        assert_eq!(relativize(Path::new("/a/b"), Path::new("/a/b/c/d.jar")), PathBuf::from("c/d.jar"));
        assert_eq!(relativize(Path::new("/a/b"), Path::new("/a/x/y")), PathBuf::from("../x/y"));
        assert_eq!(relativize(Path::new("/a/b"), Path::new("/a/b")), PathBuf::from("."));
        assert_eq!(relativize(Path::new("/a/b"), Path::new("/a/b/../c")), PathBuf::from("../c"));
    }

    #[test]
    fn test_from_properties_splits_and_resolves() {
        let mut properties = HashMap::new();
        properties.insert(CLASSPATH_KEY.to_string(), "lib/a.jar; classes ;;".to_string());
        let config = Configuration::from_properties(Path::new("/opt/app"), &properties);
        assert_eq!(
            config.classpath(),
            &[PathBuf::from("/opt/app/lib/a.jar"), PathBuf::from("/opt/app/classes")]
        );
    }

    #[test]
    fn test_create_falls_back_to_folder() {
        let dir = tempdir().unwrap();
        let config = factory(dir.path()).create().unwrap();
        assert_eq!(config.classpath(), &[dir.path().to_path_buf()]);
    }

    #[test]
    fn test_create_uses_archives() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.jar"), b"b").unwrap();
        fs::write(dir.path().join("a.jar"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        let config = factory(dir.path()).create().unwrap();
        assert_eq!(config.classpath(), &[dir.path().join("a.jar"), dir.path().join("b.jar")]);
    }

    #[test]
    fn test_create_reads_configuration_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jar"), b"a").unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIGURATION_NAME), "classpath=v1;lib/dep.jar\n").unwrap();
        let config = factory(dir.path()).create().unwrap();
        assert_eq!(config.classpath(), &[dir.path().join("v1"), dir.path().join("lib/dep.jar")]);
    }

    #[test]
    fn test_create_rejects_empty_classpath() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIGURATION_NAME), "other=value\n").unwrap();
        let error = factory(dir.path()).create().unwrap_err();
        assert!(matches!(error, AppError::Configuration { .. }));
        assert!(error.to_string().contains("No classpath defined"));
    }

    #[test]
    fn test_custom_configuration_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("foo.properties"), "classpath=classes\n").unwrap();
        let config = ConfigurationFactory::with_name(dir.path(), "foo.properties").create().unwrap();
        assert_eq!(config.classpath(), &[dir.path().join("classes")]);
    }

    #[test]
    fn test_resolve_classpath_reports_missing_entry() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.jar");
        let config = Configuration::new(vec![dir.path().to_path_buf(), missing.clone()]);
        let error = config.resolve_classpath().unwrap_err();
        assert!(matches!(error, AppError::Configuration { .. }));
        assert!(error.to_string().contains(&missing.display().to_string()));
    }

    #[test]
    fn test_resolve_classpath_accepts_files_and_folders() {
        let dir = tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        fs::write(&jar, b"PK").unwrap();
        let config = Configuration::new(vec![dir.path().to_path_buf(), jar.clone()]);
        let resolved = config.resolve_classpath().unwrap();
        assert_eq!(resolved, vec![dir.path().to_path_buf(), jar]);
    }

    #[test]
    fn test_store_empty_is_noop() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_CONFIGURATION_NAME);
        Configuration::default().store(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_store_relativizes_entries() {
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_CONFIGURATION_NAME);
        let config = Configuration::new(vec![dir.path().join("v2"), dir.path().join("lib").join("dep.jar")]);
        config.store(&target).unwrap();

        let properties = java_properties::read(BufReader::new(File::open(&target).unwrap())).unwrap();
        assert_eq!(properties.get(CLASSPATH_KEY).map(String::as_str), Some("v2;lib/dep.jar"));
        assert_eq!(factory(dir.path()).create().unwrap(), config);
    }
}
