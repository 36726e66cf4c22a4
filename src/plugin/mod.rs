//! Provider System
//!
//! Managed applications and version managers are contributed by
//! *providers*: named factories registered in a [`ProviderRegistry`] and
//! bound to classpath entries through their `providers.yaml` descriptor.
//!
//! # Example Usage
//!
//! ```no_run
//! use appma::core::Configuration;
//! use appma::plugin::{discover_application, PluginModule, ProviderRegistry};
//!
//! let registry = ProviderRegistry::with_builtins();
//! let configuration = Configuration::new(vec!["/opt/demo/app".into()]);
//! let module = PluginModule::load(&configuration, &registry)?;
//! let _active = module.enter();
//! let application = discover_application(&module, &[])?;
//! println!("{} {}", application.name(), application.version());
//! # Ok::<(), appma::core::AppError>(())
//! ```

pub mod builtin;
pub mod compatibility;
pub mod descriptor;
pub mod discovery;
pub mod module;
pub mod registry;
pub mod traits;

pub use compatibility::VersionCompatibilityChecker;
pub use descriptor::{ModuleDescriptor, ProviderEntry, DESCRIPTOR_NAME};
pub use discovery::{discover_application, discover_version_manager, supports};
pub use module::{current_module, ModuleGuard, PluginModule, Provider};
pub use registry::{ProviderContext, ProviderRegistry, SharedProviderRegistry};
pub use traits::{ApplicationType, Manageable, Renderable, VersionManager};
