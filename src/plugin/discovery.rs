//! Provider Discovery
//!
//! Selection of the managed application and of its version manager among
//! the providers of a loaded module. Enumeration follows the module's
//! provider order and the first match wins.

use std::sync::Arc;
use log::{debug, info};

use crate::core::error::{AppError, AppResult};
use crate::plugin::module::PluginModule;
use crate::plugin::traits::{ApplicationType, Manageable, VersionManager};

/// First application of `module` accepting `arguments`
pub fn discover_application(module: &PluginModule, arguments: &[String]) -> AppResult<Arc<dyn Manageable>> {
    for provider in module.applications() {
        let application = provider.instantiate()?;
        if application.accept(arguments) {
            info!(
                "The application '{}' version {} has been selected",
                application.name(),
                application.version()
            );
            return Ok(application);
        }
        debug!("The application '{}' declined the arguments", application.name());
    }
    Err(AppError::discovery("No compliant application could be found"))
}

/// First version manager of `module` compatible with `application_type`.
///
/// `Ok(None)` when no candidate matches.
pub fn discover_version_manager(
    module: &PluginModule,
    application_type: &ApplicationType,
) -> AppResult<Option<Arc<dyn VersionManager>>> {
    for provider in module.version_managers() {
        let manager = provider.instantiate()?;
        if supports(&manager.supported_types(), application_type) {
            debug!(
                "The version manager '{}' supports the application type '{}'",
                manager.name(),
                application_type
            );
            return Ok(Some(manager));
        }
    }
    debug!("No version manager supports the application type '{}'", application_type);
    Ok(None)
}

/// Declared types match when exactly one is given and the application is
/// assignable to it; any other count matches every application.
pub fn supports(declared: &[String], application_type: &ApplicationType) -> bool {
    match declared {
        [single] => application_type.is_assignable_to(single),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::configuration::Configuration;
    use crate::core::tests::mock_providers::{mock_registry, write_descriptor};
    use tempfile::tempdir;

    fn load(descriptor: &str) -> (tempfile::TempDir, Arc<PluginModule>) {
        let dir = tempdir().unwrap();
        write_descriptor(dir.path(), descriptor);
        let config = Configuration::new(vec![dir.path().to_path_buf()]);
        let module = PluginModule::load(&config, &mock_registry()).unwrap();
        (dir, module)
    }

    fn arguments(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_supports_policy() {
        let ty = ApplicationType::new("editor").with_supertypes(["document"]);
        assert!(supports(&[], &ty));
        assert!(supports(&["editor".to_string()], &ty));
        assert!(supports(&["document".to_string()], &ty));
        assert!(!supports(&["viewer".to_string()], &ty));
        assert!(supports(&["viewer".to_string(), "player".to_string()], &ty));
    }

    #[test]
    fn test_first_accepting_application_wins() {
        let (_dir, module) = load(
            "applications:\n\
             \x20 - provider: mock\n    properties: { name: picky, version: '1', accept: --picky }\n\
             \x20 - provider: mock\n    properties: { name: first, version: '1' }\n\
             \x20 - provider: mock\n    properties: { name: second, version: '1' }\n",
        );
        let application = discover_application(&module, &arguments(&["--other"])).unwrap();
        assert_eq!(application.name(), "first");

        let application = discover_application(&module, &arguments(&["--picky"])).unwrap();
        assert_eq!(application.name(), "picky");
    }

    #[test]
    fn test_no_compliant_application() {
        let (_dir, module) = load(
            "applications:\n  - provider: mock\n    properties: { name: picky, version: '1', accept: --picky }\n",
        );
        let error = discover_application(&module, &arguments(&[])).unwrap_err();
        assert!(matches!(error, AppError::Discovery { .. }));
    }

    #[test]
    fn test_version_manager_matching_by_type() {
        let (_dir, module) = load(
            "version_managers:\n\
             \x20 - provider: mock-updates\n    properties: { name: viewer-updates, applies_to: viewer }\n\
             \x20 - provider: mock-updates\n    properties: { name: editor-updates, applies_to: editor }\n\
             \x20 - provider: mock-updates\n    properties: { name: any-updates }\n",
        );
        let editor = ApplicationType::new("editor");
        let manager = discover_version_manager(&module, &editor).unwrap().unwrap();
        assert_eq!(manager.name(), "editor-updates");

        let player = ApplicationType::new("player");
        let manager = discover_version_manager(&module, &player).unwrap().unwrap();
        assert_eq!(manager.name(), "any-updates");
    }

    #[test]
    fn test_no_version_manager_is_not_an_error() {
        let (_dir, module) = load(
            "version_managers:\n  - provider: mock-updates\n    properties: { name: viewer-updates, applies_to: viewer }\n",
        );
        let result = discover_version_manager(&module, &ApplicationType::new("editor")).unwrap();
        assert!(result.is_none());
    }
}
