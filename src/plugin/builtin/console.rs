//! Console Application
//!
//! A headless managed application: it logs its lifecycle and keeps the
//! facade so the launcher can drive checks and upgrades on its behalf.

use std::path::PathBuf;
use std::sync::Arc;
use log::info;
use parking_lot::Mutex;

use crate::core::error::AppResult;
use crate::core::facade::Facade;
use crate::plugin::registry::ProviderContext;
use crate::plugin::traits::{ApplicationType, Manageable, Renderable};

const ACCEPT_ALL: &str = "*";

/// Headless application described entirely by its provider properties
pub struct ConsoleApplication {
    name: String,
    version: String,
    title: Option<String>,
    icon: Option<PathBuf>,
    application_type: ApplicationType,
    accept: String,
    facade: Mutex<Option<Arc<dyn Facade>>>,
}

impl ConsoleApplication {
    pub fn new<S: Into<String>>(name: S, version: S) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
            icon: None,
            application_type: ApplicationType::new("console"),
            accept: ACCEPT_ALL.to_string(),
            facade: Mutex::new(None),
        }
    }

    pub fn from_context(context: &ProviderContext) -> AppResult<Self> {
        let mut application = Self::new(context.require("name")?, context.require("version")?);
        application.title = context.property("title").map(str::to_string);
        application.icon = context.property("icon").map(|icon| context.base_folder().join(icon));
        application.application_type =
            ApplicationType::new(context.property("type").unwrap_or("console")).with_supertypes(context.list("supertypes"));
        if let Some(accept) = context.property("accept") {
            application.accept = accept.to_string();
        }
        Ok(application)
    }

    pub fn into_arc(self) -> Arc<dyn Manageable> {
        Arc::new(self)
    }

    /// Facade received at initialization, until destroyed
    pub fn facade(&self) -> Option<Arc<dyn Facade>> {
        self.facade.lock().clone()
    }
}

impl Manageable for ConsoleApplication {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn icon(&self) -> Option<&std::path::Path> {
        self.icon.as_deref()
    }

    fn application_type(&self) -> ApplicationType {
        self.application_type.clone()
    }

    fn accept(&self, arguments: &[String]) -> bool {
        self.accept == ACCEPT_ALL || arguments.iter().any(|argument| *argument == self.accept)
    }

    fn init(&self, facade: Arc<dyn Facade>, arguments: &[String]) -> AppResult<Option<Box<dyn Renderable>>> {
        info!(
            "{} {} started with {} argument(s)",
            self.title.as_deref().unwrap_or(&self.name),
            self.version,
            arguments.len()
        );
        *self.facade.lock() = Some(facade);
        Ok(None)
    }

    fn destroy(&self) -> AppResult<()> {
        info!("{} {} stopped", self.name, self.version);
        *self.facade.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context(properties: &[(&str, &str)]) -> ProviderContext {
        let properties: HashMap<String, String> =
            properties.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        ProviderContext::new("/opt/demo", properties)
    }

    #[test]
    fn test_from_context() {
        let application = ConsoleApplication::from_context(&context(&[
            ("name", "demo"),
            ("version", "1.2"),
            ("title", "Demo"),
            ("type", "viewer"),
            ("supertypes", "console, tool"),
        ]))
        .unwrap();
        assert_eq!(application.name(), "demo");
        assert_eq!(application.version(), "1.2");
        assert_eq!(application.title(), Some("Demo"));
        assert!(application.application_type().is_assignable_to("tool"));
        assert!(application.accept(&[]));
        assert!(!application.is_graphical());
    }

    #[test]
    fn test_version_is_required() {
        assert!(ConsoleApplication::from_context(&context(&[("name", "demo")])).is_err());
    }

    #[test]
    fn test_accept_requires_argument() {
        let application =
            ConsoleApplication::from_context(&context(&[("name", "demo"), ("version", "1"), ("accept", "--demo")])).unwrap();
        assert!(!application.accept(&["--other".to_string()]));
        assert!(application.accept(&["--other".to_string(), "--demo".to_string()]));
    }
}
