//! Provider Capability Traits
//!
//! The contracts implemented by managed applications and by the version
//! managers able to upgrade them.

use std::any::Any;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::core::configuration::Configuration;
use crate::core::error::AppResult;
use crate::core::facade::Facade;
use crate::task::Task;

/// Concrete type of a managed application, with the types it can be used as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationType {
    name: String,
    supertypes: Vec<String>,
}

impl ApplicationType {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
        }
    }

    /// Add the types this application is also an instance of
    pub fn with_supertypes<I, S>(mut self, supertypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supertypes.extend(supertypes.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Whether a value of this type can be used where `declared` is expected
    pub fn is_assignable_to(&self, declared: &str) -> bool {
        self.name == declared || self.supertypes.iter().any(|supertype| supertype == declared)
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Scene or view produced by a graphical application, shown by the host
pub trait Renderable: Send {
    /// Access to the concrete value for the host toolkit
    fn as_any(&self) -> &dyn Any;
}

/// An application whose lifecycle is driven by the launcher
pub trait Manageable: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn title(&self) -> Option<&str> {
        None
    }

    fn icon(&self) -> Option<&Path> {
        None
    }

    /// Type used to select a compatible version manager
    fn application_type(&self) -> ApplicationType;

    /// Whether this application wants to handle the given arguments
    fn accept(&self, arguments: &[String]) -> bool;

    fn is_graphical(&self) -> bool {
        false
    }

    /// Start the application; graphical applications return what the host must show
    fn init(&self, facade: Arc<dyn Facade>, arguments: &[String]) -> AppResult<Option<Box<dyn Renderable>>>;

    fn destroy(&self) -> AppResult<()>;
}

/// Knows how to check, fetch and apply patches for some application types
pub trait VersionManager: Send + Sync {
    fn name(&self) -> &str;

    /// Application type names this manager handles.
    ///
    /// Zero or several declared types make the manager usable with any application.
    fn supported_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Task reporting the newer version available, if any
    fn check(&self, application: &dyn Manageable) -> AppResult<Task<Option<String>>>;

    /// Task writing the patch archive for `application` into `sink`
    fn store(&self, application: &dyn Manageable, sink: Box<dyn Write + Send>) -> AppResult<Task<()>>;

    /// Task patching `app_root` from the extracted patch in `patch_root`.
    ///
    /// The task yields the configuration to persist, or `None` to keep and
    /// reload the current one.
    fn upgrade(&self, patch_root: &Path, app_root: &Path, old_version: &str)
        -> AppResult<Task<Option<Configuration>>>;
}

impl fmt::Debug for dyn Manageable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manageable")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

impl fmt::Debug for dyn VersionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionManager")
            .field("name", &self.name())
            .field("supported_types", &self.supported_types())
            .finish()
    }
}


impl fmt::Debug for dyn Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderable").finish_non_exhaustive()
    }
}
