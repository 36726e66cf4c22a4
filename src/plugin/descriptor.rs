//! Provider Descriptors
//!
//! Every classpath entry may carry a `providers.yaml` naming the
//! applications and version managers it contributes. Folders hold it at
//! their root; `.jar` and `.zip` archives hold it as a top-level member.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use serde::Deserialize;
use serde_yaml::Value;

use crate::core::error::{AppError, AppResult};

/// Name of the descriptor inside a classpath entry
pub const DESCRIPTOR_NAME: &str = "providers.yaml";

const ARCHIVE_EXTENSIONS: [&str; 2] = ["jar", "zip"];

/// Providers declared by a classpath entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDescriptor {
    /// API version the providers were written against (YYYYMMDD)
    #[serde(default)]
    pub api_version: Option<u32>,

    #[serde(default)]
    pub applications: Vec<ProviderEntry>,

    #[serde(default)]
    pub version_managers: Vec<ProviderEntry>,
}

/// One provider declaration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    /// Name registered in the host provider registry
    pub provider: String,

    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl ProviderEntry {
    /// Properties flattened to strings; sequences become comma lists
    pub fn string_properties(&self) -> AppResult<HashMap<String, String>> {
        self.properties
            .iter()
            .map(|(key, value)| Ok((key.clone(), scalar_to_string(key, value)?)))
            .collect()
    }
}

fn scalar_to_string(key: &str, value: &Value) -> AppResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        Value::Sequence(items) => {
            let items: AppResult<Vec<String>> = items.iter().map(|item| scalar_to_string(key, item)).collect();
            Ok(items?.join(","))
        }
        _ => Err(AppError::discovery(format!("Unsupported value for the property '{}'", key))),
    }
}

impl ModuleDescriptor {
    /// Parse and validate a descriptor
    pub fn parse(content: &str) -> AppResult<Self> {
        let descriptor: ModuleDescriptor = serde_yaml::from_str(content)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> AppResult<()> {
        let entries = self.applications.iter().chain(self.version_managers.iter());
        for entry in entries {
            if entry.provider.trim().is_empty() {
                return Err(AppError::discovery("Provider name cannot be empty"));
            }
        }
        if self.api_version == Some(0) {
            return Err(AppError::discovery("API version cannot be zero"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.version_managers.is_empty()
    }
}

/// Read the descriptor of a classpath entry, if it carries one
pub fn read_descriptor(entry: &Path) -> AppResult<Option<ModuleDescriptor>> {
    let content = if entry.is_dir() {
        read_from_folder(entry)?
    } else if is_archive(entry) {
        read_from_archive(entry)?
    } else {
        None
    };

    content
        .map(|text| {
            ModuleDescriptor::parse(&text).map_err(|e| {
                AppError::discovery(format!("Invalid descriptor in '{}': {}", entry.display(), e))
            })
        })
        .transpose()
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ARCHIVE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn read_from_folder(folder: &Path) -> AppResult<Option<String>> {
    let path = folder.join(DESCRIPTOR_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(&path)
        .map(Some)
        .map_err(|e| AppError::io(format!("Could not read '{}'", path.display()), e))
}

fn read_from_archive(archive: &Path) -> AppResult<Option<String>> {
    let file = File::open(archive).map_err(|e| AppError::io(format!("Could not open '{}'", archive.display()), e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| AppError::discovery(format!("'{}' is not a valid archive: {}", archive.display(), e)))?;
    let result = match zip.by_name(DESCRIPTOR_NAME) {
        Ok(mut member) => {
            let mut content = String::new();
            member
                .read_to_string(&mut content)
                .map_err(|e| AppError::io(format!("Could not read the descriptor of '{}'", archive.display()), e))?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(AppError::from(e)),
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    const SAMPLE: &str = r#"
api_version: 20260901
applications:
  - provider: console
    properties:
      name: demo
      version: "1.0"
      retries: 3
      accept: [--demo, --other]
version_managers:
  - provider: folder-updates
"#;

    #[test]
    fn test_parse_sample() {
        let descriptor = ModuleDescriptor::parse(SAMPLE).unwrap();
        assert_eq!(descriptor.api_version, Some(20260901));
        assert_eq!(descriptor.applications.len(), 1);
        assert_eq!(descriptor.version_managers[0].provider, "folder-updates");

        let properties = descriptor.applications[0].string_properties().unwrap();
        assert_eq!(properties["name"], "demo");
        assert_eq!(properties["version"], "1.0");
        assert_eq!(properties["retries"], "3");
        assert_eq!(properties["accept"], "--demo,--other");
    }

    #[test]
    fn test_empty_provider_is_rejected() {
        let error = ModuleDescriptor::parse("applications:\n  - provider: ''\n").unwrap_err();
        assert!(matches!(error, AppError::Discovery { .. }));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(ModuleDescriptor::parse("plugins: []\n").is_err());
    }

    #[test]
    fn test_read_from_folder() {
        let dir = tempdir().unwrap();
        assert!(read_descriptor(dir.path()).unwrap().is_none());

        fs::write(dir.path().join(DESCRIPTOR_NAME), SAMPLE).unwrap();
        let descriptor = read_descriptor(dir.path()).unwrap().unwrap();
        assert_eq!(descriptor.applications[0].provider, "console");
    }

    #[test]
    fn test_read_from_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("demo.jar");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer.start_file(DESCRIPTOR_NAME, SimpleFileOptions::default()).unwrap();
        writer.write_all(SAMPLE.as_bytes()).unwrap();
        writer.finish().unwrap();

        let descriptor = read_descriptor(&archive).unwrap().unwrap();
        assert_eq!(descriptor.version_managers.len(), 1);
    }

    #[test]
    fn test_archive_without_descriptor() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("empty.zip");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"nothing here").unwrap();
        writer.finish().unwrap();

        assert!(read_descriptor(&archive).unwrap().is_none());
    }

    #[test]
    fn test_plain_file_has_no_descriptor() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "text").unwrap();
        assert!(read_descriptor(&file).unwrap().is_none());
    }
}
