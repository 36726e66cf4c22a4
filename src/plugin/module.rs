//! Loaded Plugin Modules
//!
//! A [`PluginModule`] is the isolated loading context built from a
//! [`Configuration`]: the validated classpath, the providers its entries
//! declare bound to the host factories, and the resources it exposes.
//!
//! Code running on behalf of a module activates it with
//! [`PluginModule::enter`]; the returned guard restores the previously
//! active module when dropped, on every exit path.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use log::debug;

use crate::core::configuration::Configuration;
use crate::core::error::{AppError, AppResult};
use crate::plugin::compatibility::VersionCompatibilityChecker;
use crate::plugin::descriptor::read_descriptor;
use crate::plugin::registry::{
    ApplicationFactory, ProviderContext, ProviderRegistry, VersionManagerFactory,
};
use crate::plugin::traits::{Manageable, VersionManager};

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_MODULE: RefCell<Option<Arc<PluginModule>>> = const { RefCell::new(None) };
}

/// Provider bound to the factory that creates it
pub struct Provider<F> {
    name: String,
    context: ProviderContext,
    factory: F,
}

impl<F> Provider<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &ProviderContext {
        &self.context
    }
}

impl Provider<ApplicationFactory> {
    pub fn instantiate(&self) -> AppResult<Arc<dyn Manageable>> {
        (self.factory)(&self.context)
    }
}

impl Provider<VersionManagerFactory> {
    pub fn instantiate(&self) -> AppResult<Arc<dyn VersionManager>> {
        (self.factory)(&self.context)
    }
}

/// Loading context for one classpath
pub struct PluginModule {
    id: u64,
    classpath: Vec<PathBuf>,
    applications: Vec<Provider<ApplicationFactory>>,
    version_managers: Vec<Provider<VersionManagerFactory>>,
}

impl PluginModule {
    /// Validate the classpath of `configuration` and bind the providers it declares.
    ///
    /// Providers keep classpath order, then descriptor order.
    pub fn load(configuration: &Configuration, registry: &ProviderRegistry) -> AppResult<Arc<Self>> {
        Self::load_with(configuration, registry, VersionCompatibilityChecker::default())
    }

    pub fn load_with(
        configuration: &Configuration,
        registry: &ProviderRegistry,
        checker: VersionCompatibilityChecker,
    ) -> AppResult<Arc<Self>> {
        let classpath = configuration.resolve_classpath()?;
        let mut applications = Vec::new();
        let mut version_managers = Vec::new();

        for entry in &classpath {
            let descriptor = match read_descriptor(entry)? {
                Some(descriptor) => descriptor,
                None => continue,
            };
            checker.check_descriptor(&entry.display().to_string(), descriptor.api_version)?;

            for declared in &descriptor.applications {
                let factory = registry.application_factory(&declared.provider).ok_or_else(|| {
                    unknown_provider("application", &declared.provider, entry)
                })?;
                applications.push(Provider {
                    name: declared.provider.clone(),
                    context: ProviderContext::new(entry, declared.string_properties()?),
                    factory,
                });
            }
            for declared in &descriptor.version_managers {
                let factory = registry.version_manager_factory(&declared.provider).ok_or_else(|| {
                    unknown_provider("version manager", &declared.provider, entry)
                })?;
                version_managers.push(Provider {
                    name: declared.provider.clone(),
                    context: ProviderContext::new(entry, declared.string_properties()?),
                    factory,
                });
            }
        }

        let module = PluginModule {
            id: NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed),
            classpath,
            applications,
            version_managers,
        };
        debug!(
            "Loaded module #{} with {} application(s) and {} version manager(s)",
            module.id,
            module.applications.len(),
            module.version_managers.len()
        );
        Ok(Arc::new(module))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Validated, absolute classpath entries
    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    pub fn applications(&self) -> &[Provider<ApplicationFactory>] {
        &self.applications
    }

    pub fn version_managers(&self) -> &[Provider<VersionManagerFactory>] {
        &self.version_managers
    }

    /// Locate a resource in the folder entries of the classpath
    pub fn resource(&self, name: &str) -> Option<PathBuf> {
        self.classpath
            .iter()
            .filter(|entry| entry.is_dir())
            .map(|entry| entry.join(name))
            .find(|candidate| candidate.exists())
    }

    /// Make this module the active one on the current thread
    pub fn enter(self: &Arc<Self>) -> ModuleGuard {
        let previous = ACTIVE_MODULE.with(|active| active.borrow_mut().replace(Arc::clone(self)));
        ModuleGuard {
            previous,
            _not_send: PhantomData,
        }
    }
}

fn unknown_provider(kind: &str, name: &str, entry: &Path) -> AppError {
    AppError::discovery(format!(
        "Unknown {} provider '{}' declared in '{}'",
        kind,
        name,
        entry.display()
    ))
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("id", &self.id)
            .field("classpath", &self.classpath)
            .field("applications", &provider_names(&self.applications))
            .field("version_managers", &provider_names(&self.version_managers))
            .finish()
    }
}

fn provider_names<F>(providers: &[Provider<F>]) -> Vec<&str> {
    providers.iter().map(|provider| provider.name.as_str()).collect()
}

/// Module active on the current thread, if any
pub fn current_module() -> Option<Arc<PluginModule>> {
    ACTIVE_MODULE.with(|active| active.borrow().clone())
}

/// Restores the previously active module when dropped
#[must_use = "the module is only active while the guard is alive"]
pub struct ModuleGuard {
    previous: Option<Arc<PluginModule>>,
    // Activation is per thread
    _not_send: PhantomData<*const ()>,
}

impl Drop for ModuleGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_MODULE.with(|active| *active.borrow_mut() = previous);
    }
}
