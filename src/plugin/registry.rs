//! Provider Registry
//!
//! The host's table of provider factories. Descriptors found on a classpath
//! name providers; the registry turns those names into instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{AppError, AppResult};
use crate::plugin::traits::{Manageable, VersionManager};

/// Context handed to a provider factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContext {
    location: PathBuf,
    properties: HashMap<String, String>,
}

impl ProviderContext {
    pub fn new<P: AsRef<Path>>(location: P, properties: HashMap<String, String>) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            properties,
        }
    }

    /// Classpath entry the provider was declared in
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Folder relative paths in properties are resolved against
    pub fn base_folder(&self) -> &Path {
        if self.location.is_dir() {
            &self.location
        } else {
            self.location.parent().unwrap_or(&self.location)
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Fetch a mandatory property
    pub fn require(&self, key: &str) -> AppResult<&str> {
        self.property(key).ok_or_else(|| {
            AppError::discovery(format!(
                "Missing property '{}' for the provider declared in '{}'",
                key,
                self.location.display()
            ))
        })
    }

    /// Comma separated property as a list, empty when absent
    pub fn list(&self, key: &str) -> Vec<String> {
        self.property(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }
}

/// Factory creating a managed application
pub type ApplicationFactory = Arc<dyn Fn(&ProviderContext) -> AppResult<Arc<dyn Manageable>> + Send + Sync>;

/// Factory creating a version manager
pub type VersionManagerFactory = Arc<dyn Fn(&ProviderContext) -> AppResult<Arc<dyn VersionManager>> + Send + Sync>;

/// Named provider factories known to the host
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    applications: HashMap<String, ApplicationFactory>,
    version_managers: HashMap<String, VersionManagerFactory>,
}

/// Registry shared between the launcher and every loaded module
pub type SharedProviderRegistry = Arc<ProviderRegistry>;

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the builtin providers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::plugin::builtin::register(&mut registry);
        registry
    }

    /// Register an application factory under `name`
    pub fn register_application<S, F>(&mut self, name: S, factory: F) -> AppResult<()>
    where
        S: Into<String>,
        F: Fn(&ProviderContext) -> AppResult<Arc<dyn Manageable>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.applications.contains_key(&name) {
            return Err(AppError::discovery(format!("Application provider already registered: {}", name)));
        }
        self.applications.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Register a version manager factory under `name`
    pub fn register_version_manager<S, F>(&mut self, name: S, factory: F) -> AppResult<()>
    where
        S: Into<String>,
        F: Fn(&ProviderContext) -> AppResult<Arc<dyn VersionManager>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.version_managers.contains_key(&name) {
            return Err(AppError::discovery(format!("Version manager provider already registered: {}", name)));
        }
        self.version_managers.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn application_factory(&self, name: &str) -> Option<ApplicationFactory> {
        self.applications.get(name).cloned()
    }

    pub fn version_manager_factory(&self, name: &str) -> Option<VersionManagerFactory> {
        self.version_managers.get(name).cloned()
    }

    /// Registered application provider names, sorted
    pub fn list_applications(&self) -> Vec<String> {
        let mut names: Vec<String> = self.applications.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered version manager provider names, sorted
    pub fn list_version_managers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.version_managers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("applications", &self.list_applications())
            .field("version_managers", &self.list_version_managers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tests::mock_providers::MockApplication;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_application("mock", |_| Ok(MockApplication::new("mock", "1.0").into_arc()))
            .unwrap();
        assert!(registry.application_factory("mock").is_some());
        assert!(registry.application_factory("other").is_none());
        assert_eq!(registry.list_applications(), vec!["mock".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_application("mock", |_| Ok(MockApplication::new("mock", "1.0").into_arc()))
            .unwrap();
        let error = registry
            .register_application("mock", |_| Ok(MockApplication::new("mock", "2.0").into_arc()))
            .unwrap_err();
        assert!(matches!(error, AppError::Discovery { .. }));
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.list_applications().contains(&"console".to_string()));
        assert!(registry.list_version_managers().contains(&"folder-updates".to_string()));
    }

    #[test]
    fn test_context_properties() {
        let mut properties = HashMap::new();
        properties.insert("name".to_string(), "demo".to_string());
        properties.insert("applies_to".to_string(), "a, b,,c".to_string());
        let context = ProviderContext::new("/opt/app/lib/demo.jar", properties);

        assert_eq!(context.require("name").unwrap(), "demo");
        assert!(context.require("version").is_err());
        assert_eq!(context.list("applies_to"), vec!["a", "b", "c"]);
        assert!(context.list("missing").is_empty());
        assert_eq!(context.base_folder(), Path::new("/opt/app/lib"));
    }
}
