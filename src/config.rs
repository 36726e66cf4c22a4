//! Launcher Settings
//!
//! TOML settings of the launcher itself, flattened to `section -> key ->
//! value` strings. Two sections are read: `[logging]` and `[launcher]`.
//!
//! ```toml
//! [logging]
//! console-level = "info"
//! format = "json"
//! file = "/var/log/appma.log"
//! file-level = "debug"
//!
//! [launcher]
//! configuration-name = "demo.properties"
//! patch-file = "/tmp/demo-patch.zip"
//! staging-folder = "/tmp/demo-staging"
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use log::{debug, info};
use toml::Value;

/// Environment variable naming the settings file
pub const SETTINGS_ENV: &str = "APPMA_LOGGING_CONFIG";

/// Settings file name looked up in the root and user config folders
pub const SETTINGS_FILE: &str = "appma.toml";

pub const LOGGING_SECTION: &str = "logging";
pub const LAUNCHER_SECTION: &str = "launcher";

/// Settings storage - section_name -> key -> value
pub type Settings = HashMap<String, HashMap<String, String>>;

/// Launcher options from the `[launcher]` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LauncherSettings {
    pub configuration_name: Option<String>,
    pub patch_file: Option<PathBuf>,
    pub staging_folder: Option<PathBuf>,
}

/// Settings manager
#[derive(Debug, Default)]
pub struct ConfigManager {
    settings: Settings,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a ConfigManager from in-memory settings
    pub fn from_settings(settings: Settings) -> Self {
        Self { settings, source: None }
    }

    /// Load the first settings file found for the application installed in `root`
    pub fn load(root: &Path) -> Result<Self> {
        debug!("Starting settings discovery");
        for path in discover_settings_files(root) {
            debug!("Attempting to load settings from: {}", path.display());
            if path.is_file() {
                return Self::load_from_file(path);
            }
        }
        info!("No settings file found, using defaults");
        Ok(Self::default())
    }

    /// Load settings from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = parse_toml_settings(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        info!("Loaded settings from: {}", path.display());
        Ok(Self {
            settings,
            source: Some(path),
        })
    }

    /// File the settings were read from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        self.settings.get(section).and_then(|values| values.get(key))
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value; relative paths are resolved against the settings file folder
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(|value| {
            let path = PathBuf::from(value);
            match self.source.as_deref().and_then(Path::parent) {
                Some(parent) if path.is_relative() => parent.join(path),
                _ => path,
            }
        })
    }

    /// The `[launcher]` section
    pub fn launcher_settings(&self) -> LauncherSettings {
        LauncherSettings {
            configuration_name: self.get_value(LAUNCHER_SECTION, "configuration-name").cloned(),
            patch_file: self.get_path(LAUNCHER_SECTION, "patch-file"),
            staging_folder: self.get_path(LAUNCHER_SECTION, "staging-folder"),
        }
    }
}

/// Settings files in order of precedence
fn discover_settings_files(root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = env::var(SETTINGS_ENV) {
        paths.push(PathBuf::from(env_path));
    }

    paths.push(root.join(SETTINGS_FILE));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("appma").join(SETTINGS_FILE));
    }

    debug!("Settings discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based settings
fn parse_toml_settings(content: &str) -> Result<Settings> {
    let value: Value = content.parse().context("Failed to parse TOML content")?;

    let mut settings = Settings::new();
    if let Value::Table(table) = value {
        for (section, values) in table {
            match values {
                Value::Table(values) => {
                    let entries = values
                        .iter()
                        .map(|(key, value)| (key.clone(), toml_value_to_string(value)))
                        .collect();
                    settings.insert(section, entries);
                }
                other => {
                    return Err(anyhow::anyhow!(
                        "Unexpected top-level value '{}' for '{}', settings belong to sections",
                        other,
                        section
                    ))
                }
            }
        }
    }
    Ok(settings)
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[logging]
console-level = "debug"
format = "json"
file = "logs/appma.log"

[launcher]
configuration-name = "demo.properties"
staging-folder = "/tmp/demo-staging"
"#;

    #[test]
    fn test_parse_sections() {
        let settings = parse_toml_settings(SAMPLE).unwrap();
        assert_eq!(settings["logging"]["console-level"], "debug");
        assert_eq!(settings["launcher"]["configuration-name"], "demo.properties");
    }

    #[test]
    fn test_top_level_values_are_rejected() {
        assert!(parse_toml_settings("verbose = true\n").is_err());
        assert!(parse_toml_settings("[logging\n").is_err());
    }

    #[test]
    fn test_toml_value_to_string_conversion() {
        assert_eq!(toml_value_to_string(&Value::Integer(42)), "42");
        assert_eq!(toml_value_to_string(&Value::Boolean(false)), "false");
        assert_eq!(toml_value_to_string(&Value::String("x".to_string())), "x");
    }

    #[test]
    fn test_load_from_root_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), SAMPLE).unwrap();
        let manager = ConfigManager::load_from_file(dir.path().join(SETTINGS_FILE)).unwrap();

        assert_eq!(manager.source(), Some(dir.path().join(SETTINGS_FILE).as_path()));
        assert_eq!(
            manager.get_log_level(LOGGING_SECTION, "console-level").unwrap(),
            Some(log::LevelFilter::Debug)
        );
        assert_eq!(manager.get_path(LOGGING_SECTION, "file"), Some(dir.path().join("logs/appma.log")));

        let launcher = manager.launcher_settings();
        assert_eq!(launcher.configuration_name.as_deref(), Some("demo.properties"));
        assert_eq!(launcher.staging_folder, Some(PathBuf::from("/tmp/demo-staging")));
        assert_eq!(launcher.patch_file, None);
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        let mut settings = Settings::new();
        settings.insert(
            LOGGING_SECTION.to_string(),
            HashMap::from([("console-level".to_string(), "chatty".to_string())]),
        );
        let manager = ConfigManager::from_settings(settings);
        assert!(manager.get_log_level(LOGGING_SECTION, "console-level").is_err());
        assert!(manager.get_log_level(LOGGING_SECTION, "file-level").unwrap().is_none());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(ConfigManager::load_from_file(dir.path().join("absent.toml")).is_err());
    }
}
