//! Application Lifecycle
//!
//! [`ApplicationManager`] owns the managed application: it creates it from
//! the current [`Configuration`], initializes and destroys it, and upgrades
//! it in place. Every mutating operation starts with a compare-and-set on
//! the shared [`StateCell`]; a failure after that first transition leaves
//! the manager in [`ApplicationState::Unknown`].
//!
//! Upgrades and asynchronous initialization run on a single worker thread,
//! so they never overlap.

use std::fs::{self, File};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tempfile::{TempDir, TempPath};

use crate::core::configuration::{configuration_name, Configuration, ConfigurationFactory};
use crate::core::error::{AppError, AppResult};
use crate::core::executor::{AsyncTaskExecutor, TaskFuture};
use crate::core::facade::{ExitPredicate, Facade, HeadlessHost, Host, UpgradeOutcome, WindowHandle};
use crate::core::state::{ApplicationState, StateCell};
use crate::io::{Archive, Folder};
use crate::plugin::discovery::{discover_application, discover_version_manager};
use crate::plugin::module::PluginModule;
use crate::plugin::registry::SharedProviderRegistry;
use crate::plugin::traits::{ApplicationType, Manageable, Renderable, VersionManager};
use crate::task::{attach, LogProgress, ProgressSink, Task};

const WORKER_NAME: &str = "appma-worker";

/// Callback invoked when an asynchronous initialization fails
pub type InitErrorCallback = Box<dyn FnOnce(&AppError) + Send>;

/// The live application and the module it was loaded from
#[derive(Clone)]
struct LoadedApplication {
    application: Arc<dyn Manageable>,
    module: Arc<PluginModule>,
}

struct ManagerInner {
    root: PathBuf,
    arguments: Vec<String>,
    registry: SharedProviderRegistry,
    configuration_name: String,
    patch_file: Option<PathBuf>,
    staging_folder: Option<PathBuf>,
    host: Arc<dyn Host>,
    state: StateCell,
    configuration: Mutex<Configuration>,
    current: Mutex<Option<LoadedApplication>>,
    executor: AsyncTaskExecutor,
    exit_predicate: Mutex<Option<ExitPredicate>>,
    exiting: AtomicBool,
}

/// Builder for [`ApplicationManager`]
pub struct ManagerBuilder {
    root: PathBuf,
    registry: SharedProviderRegistry,
    arguments: Vec<String>,
    patch_file: Option<PathBuf>,
    staging_folder: Option<PathBuf>,
    host: Option<Arc<dyn Host>>,
    configuration_name: Option<String>,
}

impl ManagerBuilder {
    /// Arguments handed to the application
    pub fn arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// File receiving the patch archive; a temporary file otherwise
    pub fn patch_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.patch_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Folder the patch is extracted into; a temporary folder otherwise
    pub fn staging_folder<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.staging_folder = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Name of the configuration file in the root folder
    pub fn configuration_name<S: Into<String>>(mut self, name: S) -> Self {
        self.configuration_name = Some(name.into());
        self
    }

    /// Load the configuration of the root folder and start the worker
    pub fn build(self) -> AppResult<ApplicationManager> {
        let configuration_name = self.configuration_name.unwrap_or_else(configuration_name);
        let configuration = ConfigurationFactory::with_name(&self.root, configuration_name.as_str()).create()?;
        let executor = AsyncTaskExecutor::new(WORKER_NAME)?;
        let host = self.host.unwrap_or_else(|| Arc::new(HeadlessHost::new()));

        Ok(ApplicationManager {
            inner: Arc::new(ManagerInner {
                root: self.root,
                arguments: self.arguments,
                registry: self.registry,
                configuration_name,
                patch_file: self.patch_file,
                staging_folder: self.staging_folder,
                host,
                state: StateCell::default(),
                configuration: Mutex::new(configuration),
                current: Mutex::new(None),
                executor,
                exit_predicate: Mutex::new(None),
                exiting: AtomicBool::new(false),
            }),
        })
    }
}

/// Lifecycle owner of the managed application
#[derive(Clone)]
pub struct ApplicationManager {
    inner: Arc<ManagerInner>,
}

impl ApplicationManager {
    /// Start building a manager for the application installed in `root`
    pub fn builder<P: AsRef<Path>>(root: P, registry: SharedProviderRegistry) -> ManagerBuilder {
        ManagerBuilder {
            root: root.as_ref().to_path_buf(),
            registry,
            arguments: Vec::new(),
            patch_file: None,
            staging_folder: None,
            host: None,
            configuration_name: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn arguments(&self) -> &[String] {
        &self.inner.arguments
    }

    pub fn state(&self) -> ApplicationState {
        self.inner.state.get()
    }

    pub fn configuration(&self) -> Configuration {
        self.inner.configuration.lock().clone()
    }

    /// The live application, if any
    pub fn application(&self) -> Option<Arc<dyn Manageable>> {
        self.inner.current.lock().as_ref().map(|loaded| Arc::clone(&loaded.application))
    }

    /// Facade handed to the application; it does not keep the manager alive
    pub fn facade(&self) -> Arc<dyn Facade> {
        Arc::new(ManagerFacade {
            manager: Arc::downgrade(&self.inner),
        })
    }

    /// Whether the host has been asked to exit
    pub fn is_exiting(&self) -> bool {
        self.inner.exiting.load(Ordering::SeqCst)
    }

    /// Discover and instantiate the application accepting the arguments
    pub fn create(&self) -> AppResult<Arc<dyn Manageable>> {
        self.transition(ApplicationState::Destroyed, ApplicationState::Creating, "create")?;

        let created = guarded("Could not create the application", || {
            let configuration = self.configuration();
            let module = PluginModule::load(&configuration, &self.inner.registry)?;
            let _active = module.enter();
            let application = discover_application(&module, &self.inner.arguments)?;
            Ok(LoadedApplication { application, module })
        });

        match created {
            Ok(loaded) => {
                let application = Arc::clone(&loaded.application);
                *self.inner.current.lock() = Some(loaded);
                self.inner.state.set(ApplicationState::Created);
                info!(
                    "The application '{}' version {} has been created",
                    application.name(),
                    application.version()
                );
                Ok(application)
            }
            Err(e) => {
                self.inner.state.set(ApplicationState::Unknown);
                Err(e)
            }
        }
    }

    /// Initialize the created application with the module active
    pub fn init(&self) -> AppResult<Option<Box<dyn Renderable>>> {
        self.transition(ApplicationState::Created, ApplicationState::Initializing, "init")?;

        let initialized = self.loaded("init").and_then(|loaded| {
            let _active = loaded.module.enter();
            info!(
                "Init the application '{}' version {}",
                loaded.application.name(),
                loaded.application.version()
            );
            let facade = self.facade();
            guarded("Could not init the application", || {
                loaded.application.init(facade, &self.inner.arguments)
            })
        });

        match initialized {
            Ok(scene) => {
                self.inner.state.set(ApplicationState::Initialized);
                Ok(scene)
            }
            Err(e) => {
                self.inner.state.set(ApplicationState::Unknown);
                Err(e)
            }
        }
    }

    /// Initialize the application and hand its scene to the host
    pub fn init_and_show(&self) -> AppResult<()> {
        if let Some(scene) = self.init()? {
            self.inner.host.show(scene)?;
        }
        Ok(())
    }

    /// Run [`ApplicationManager::init_and_show`] on the worker
    pub fn init_async(&self, on_error: Option<InitErrorCallback>) -> AppResult<TaskFuture<AppResult<()>>> {
        let manager = self.clone();
        self.inner.executor.submit(move || {
            let outcome = manager.init_and_show();
            if let Err(e) = &outcome {
                error!("{}", e);
                if let Some(callback) = on_error {
                    callback(e);
                }
            }
            outcome
        })
    }

    /// Destroy the initialized application
    pub fn destroy(&self) -> AppResult<()> {
        self.transition(ApplicationState::Initialized, ApplicationState::Destroying, "destroy")?;

        let destroyed = self.loaded("destroy").and_then(|loaded| {
            let _active = loaded.module.enter();
            info!(
                "Destroy the application '{}' version {}",
                loaded.application.name(),
                loaded.application.version()
            );
            if let Some(icon) = loaded.application.icon() {
                self.inner.host.icon_removed(icon);
            }
            guarded("Could not destroy the application", || loaded.application.destroy())?;
            *self.inner.current.lock() = None;
            Ok(())
        });

        match destroyed {
            Ok(()) => {
                self.inner.state.set(ApplicationState::Destroyed);
                Ok(())
            }
            Err(e) => {
                self.inner.state.set(ApplicationState::Unknown);
                Err(e)
            }
        }
    }

    /// Task checking whether a newer version of the running application exists
    pub fn check_for_update(&self) -> AppResult<Task<Option<String>>> {
        let loaded = self
            .inner
            .current
            .lock()
            .clone()
            .ok_or_else(|| AppError::application("Could not check for update as there is no application running"))?;

        let _active = loaded.module.enter();
        let checked = self
            .version_manager(&loaded.module, &loaded.application.application_type())
            .and_then(|version_manager| {
                info!(
                    "Checking for update for the application '{}' version {}",
                    loaded.application.name(),
                    loaded.application.version()
                );
                guarded("Could not check for update", || version_manager.check(loaded.application.as_ref()))
            });
        if let Err(e) = &checked {
            error!("Could not check for update: {}", e);
        }
        checked
    }

    /// Schedule an upgrade on the worker.
    ///
    /// The application must be initialized when this is called and again
    /// when the worker picks the upgrade up. A failed upgrade asks the host
    /// to exit.
    pub fn upgrade(&self) -> AppResult<TaskFuture<AppResult<UpgradeOutcome>>> {
        let state = self.state();
        if state != ApplicationState::Initialized {
            return Err(AppError::illegal_state("upgrade", state));
        }
        let manager = self.clone();
        self.inner.executor.submit(move || {
            let outcome = manager.do_upgrade();
            if let Err(e) = &outcome {
                error!("{}", e);
                manager.exit();
            }
            outcome
        })
    }

    /// Fetch, extract and apply the patch, then boot the patched application
    pub fn do_upgrade(&self) -> AppResult<UpgradeOutcome> {
        let state = self.state();
        if state != ApplicationState::Initialized {
            return Err(AppError::illegal_state("upgrade", state));
        }
        let loaded = self
            .inner
            .current
            .lock()
            .clone()
            .ok_or_else(|| AppError::illegal_state("upgrade", self.state()))?;

        let application_type = loaded.application.application_type();
        let old_version = loaded.application.version().to_string();
        let version_manager = {
            let _active = loaded.module.enter();
            self.version_manager(&loaded.module, &application_type)?
        };

        let staging = match self.fetch_patch(&loaded, version_manager.as_ref())? {
            Some(staging) => staging,
            None => return Ok(UpgradeOutcome::Abandoned),
        };
        drop(version_manager);
        drop(loaded);

        if let Err(e) = self.destroy() {
            staging.delete();
            // The exit path destroyed the application first
            if e.is_illegal_state() && self.is_exiting() {
                debug!("The upgrade has been abandoned as the launcher is exiting: {}", e);
                return Ok(UpgradeOutcome::Abandoned);
            }
            return Err(e);
        }
        self.apply_and_show(&application_type, staging, old_version)
    }

    /// Best-effort destroy, then stop the worker and ask the host to exit
    pub fn on_exit(&self) {
        match self.destroy() {
            Ok(()) => {}
            Err(e) if e.is_illegal_state() => debug!("No application to destroy on exit: {}", e),
            Err(e) => warn!("Could not destroy the application on exit: {}", e),
        }
        self.exit();
    }

    /// Consult the exit predicate registered by the application
    pub fn confirm_exit(&self) -> bool {
        match self.inner.exit_predicate.lock().as_ref() {
            Some(predicate) => predicate(),
            None => true,
        }
    }

    /// Wait for the work queued on the worker, which accepts no more
    pub fn join(&self) {
        self.inner.executor.join();
    }

    fn transition(&self, from: ApplicationState, to: ApplicationState, operation: &'static str) -> AppResult<()> {
        self.inner
            .state
            .compare_and_set(from, to)
            .map_err(|actual| AppError::illegal_state(operation, actual))
    }

    fn loaded(&self, operation: &'static str) -> AppResult<LoadedApplication> {
        self.inner
            .current
            .lock()
            .clone()
            .ok_or_else(|| AppError::application(format!("Could not {} the application as none is loaded", operation)))
    }

    fn set_configuration(&self, configuration: Configuration) {
        *self.inner.configuration.lock() = configuration;
    }

    fn load_configuration(&self) -> AppResult<()> {
        let configuration =
            ConfigurationFactory::with_name(&self.inner.root, self.inner.configuration_name.as_str()).create()?;
        self.set_configuration(configuration);
        Ok(())
    }

    /// Persist the configuration produced by a patch, or reload from the root folder
    fn reload(&self, configuration: Option<Configuration>) -> AppResult<()> {
        let config_file = self.inner.root.join(&self.inner.configuration_name);
        match configuration {
            None => {
                if config_file.exists() {
                    if let Err(e) = fs::remove_file(&config_file) {
                        warn!("The file '{}' could not be deleted: {}", config_file.display(), e);
                    }
                }
                self.load_configuration()
            }
            Some(configuration) => match configuration.store(&config_file) {
                Ok(()) => {
                    self.set_configuration(configuration);
                    Ok(())
                }
                Err(e) => {
                    error!("The configuration could not be stored: {}", e);
                    self.load_configuration()
                }
            },
        }
    }

    fn version_manager(
        &self,
        module: &PluginModule,
        application_type: &ApplicationType,
    ) -> AppResult<Arc<dyn VersionManager>> {
        guarded("Could not look up the version manager", || {
            discover_version_manager(module, application_type)
        })?
        .ok_or_else(|| AppError::discovery("No version manager could be found"))
    }

    /// Download the patch and extract it; `None` when a task was canceled
    fn fetch_patch(&self, loaded: &LoadedApplication, version_manager: &dyn VersionManager) -> AppResult<Option<Staging>> {
        let _active = loaded.module.enter();
        let fetched = self.patch_target().and_then(|patch_file| {
            let extracted = self.download_and_extract(loaded.application.as_ref(), version_manager, patch_file.path());
            patch_file.delete();
            extracted
        });

        match fetched {
            Ok(staging) => Ok(Some(staging)),
            Err(e) if e.is_interrupted() => {
                debug!("The upgrade has been abandoned: {}", e);
                self.exit();
                Ok(None)
            }
            Err(e) => {
                self.inner.state.set(ApplicationState::Unknown);
                Err(e)
            }
        }
    }

    fn download_and_extract(
        &self,
        application: &dyn Manageable,
        version_manager: &dyn VersionManager,
        patch_file: &Path,
    ) -> AppResult<Staging> {
        let sink = File::create(patch_file)
            .map_err(|e| AppError::io(format!("Could not create '{}'", patch_file.display()), e))?;
        let store = guarded("Could not upgrade the application", || {
            version_manager.store(application, Box::new(sink))
        })?;
        self.execute_task(
            &format!("Getting the new version of the application '{}'", application.name()),
            store,
        )?;

        let staging = self.staging_target()?;
        let unzip = Archive::new(patch_file).unzip_task(staging.path().to_path_buf());
        if let Err(e) = self.execute_task("Unzipping the patch", unzip) {
            staging.delete();
            return Err(e);
        }
        Ok(staging)
    }

    fn apply_and_show(
        &self,
        application_type: &ApplicationType,
        staging: Staging,
        old_version: String,
    ) -> AppResult<UpgradeOutcome> {
        if let Err(actual) = self
            .inner
            .state
            .compare_and_set(ApplicationState::Destroyed, ApplicationState::Upgrading)
        {
            staging.delete();
            return Err(AppError::illegal_state("upgrade", actual));
        }

        let applied = self.apply_patch(application_type, staging.path(), &old_version);
        staging.delete();
        match applied {
            Ok(()) => {}
            Err(e) if e.is_interrupted() => {
                debug!("The upgrade has been abandoned: {}", e);
                self.exit();
                return Ok(UpgradeOutcome::Abandoned);
            }
            Err(e) => {
                self.inner.state.set(ApplicationState::Unknown);
                return Err(e);
            }
        }

        self.transition(ApplicationState::Upgrading, ApplicationState::Destroyed, "upgrade")?;
        if self.is_exiting() {
            info!("The patched application is not started as the launcher is exiting");
            return Ok(UpgradeOutcome::Abandoned);
        }
        let application = self.create()?;
        if let Some(icon) = application.icon() {
            self.inner.host.icon_added(icon);
        }
        self.init_and_show()?;
        if self.is_exiting() {
            // The exit path ran while the patched application was booting
            if let Err(e) = self.destroy() {
                warn!("Could not destroy the application on exit: {}", e);
            }
            return Ok(UpgradeOutcome::Abandoned);
        }
        info!(
            "The application '{}' has been upgraded from version {} to {}",
            application.name(),
            old_version,
            application.version()
        );
        Ok(UpgradeOutcome::Upgraded {
            from: old_version,
            to: application.version().to_string(),
        })
    }

    fn apply_patch(&self, application_type: &ApplicationType, patch_folder: &Path, old_version: &str) -> AppResult<()> {
        let configuration =
            ConfigurationFactory::with_name(patch_folder, self.inner.configuration_name.as_str()).create()?;
        let module = PluginModule::load(&configuration, &self.inner.registry)?;
        let _active = module.enter();
        let version_manager = self.version_manager(&module, application_type)?;
        let upgrade = guarded("Could not upgrade the application", || {
            version_manager.upgrade(patch_folder, &self.inner.root, old_version)
        })?;
        let configuration = self.execute_task("Applying the patch", upgrade)?;
        self.reload(configuration)
    }

    /// Run `task` on the calling thread with the host progress sink attached
    fn execute_task<T>(&self, description: &str, task: Task<T>) -> AppResult<T> {
        info!("{}", description);
        let sink: Arc<dyn ProgressSink> = self
            .inner
            .host
            .progress_sink()
            .unwrap_or_else(|| Arc::new(LogProgress));
        let listener = attach(task.handle(), sink)?;
        let name = task.name().to_string();
        let result = guarded(&format!("The task '{}' failed unexpectedly", name), move || task.execute());
        listener.join();
        result
    }

    fn patch_target(&self) -> AppResult<PatchFile> {
        match &self.inner.patch_file {
            Some(path) => Ok(PatchFile::Fixed(path.clone())),
            None => tempfile::Builder::new()
                .prefix("appma-patch")
                .suffix(".zip")
                .tempfile()
                .map(|file| PatchFile::Temporary(file.into_temp_path()))
                .map_err(|e| AppError::io("Could not create the patch file", e)),
        }
    }

    fn staging_target(&self) -> AppResult<Staging> {
        match &self.inner.staging_folder {
            Some(path) => Ok(Staging::Fixed(Folder::new(path))),
            None => tempfile::Builder::new()
                .prefix("appma-upgrade")
                .tempdir()
                .map(Staging::Temporary)
                .map_err(|e| AppError::io("Could not create the staging folder", e)),
        }
    }

    /// Stop accepting work and ask the host to exit, at most once
    fn exit(&self) {
        self.inner.executor.stop();
        if !self.inner.exiting.swap(true, Ordering::SeqCst) {
            self.inner.host.request_exit();
        }
    }
}

impl std::fmt::Debug for ApplicationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationManager")
            .field("root", &self.inner.root)
            .field("state", &self.state())
            .field("configuration", &*self.inner.configuration.lock())
            .finish()
    }
}

/// Call into provider code, turning a panic into an application error
fn guarded<T, F>(message: &str, call: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T>,
{
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| Err(AppError::from_panic(message, payload)))
}

enum PatchFile {
    Temporary(TempPath),
    Fixed(PathBuf),
}

impl PatchFile {
    fn path(&self) -> &Path {
        match self {
            PatchFile::Temporary(path) => &**path,
            PatchFile::Fixed(path) => path.as_path(),
        }
    }

    fn delete(self) {
        let path = self.path().to_path_buf();
        let removed = match self {
            PatchFile::Temporary(temp) => temp.close(),
            PatchFile::Fixed(fixed) if fixed.exists() => fs::remove_file(&fixed),
            PatchFile::Fixed(_) => Ok(()),
        };
        if let Err(e) = removed {
            warn!("The file '{}' could not be deleted: {}", path.display(), e);
        }
    }
}

enum Staging {
    Temporary(TempDir),
    Fixed(Folder),
}

impl Staging {
    fn path(&self) -> &Path {
        match self {
            Staging::Temporary(dir) => dir.path(),
            Staging::Fixed(folder) => folder.path(),
        }
    }

    fn delete(self) {
        match self {
            Staging::Temporary(dir) => {
                let path = dir.path().to_path_buf();
                if let Err(e) = dir.close() {
                    warn!("Could not delete '{}': {}", path.display(), e);
                }
            }
            Staging::Fixed(folder) => {
                folder.delete();
            }
        }
    }
}

/// Facade given to applications, bound weakly to its manager
struct ManagerFacade {
    manager: Weak<ManagerInner>,
}

impl ManagerFacade {
    fn manager(&self) -> AppResult<ApplicationManager> {
        self.manager
            .upgrade()
            .map(|inner| ApplicationManager { inner })
            .ok_or_else(|| AppError::application("The application manager is no longer available"))
    }
}

impl Facade for ManagerFacade {
    fn host_window_handle(&self) -> Option<WindowHandle> {
        self.manager().ok().and_then(|manager| manager.inner.host.window_handle())
    }

    fn check_for_update(&self) -> AppResult<Task<Option<String>>> {
        self.manager()?.check_for_update()
    }

    fn upgrade(&self) -> AppResult<TaskFuture<AppResult<UpgradeOutcome>>> {
        self.manager()?.upgrade()
    }

    fn on_exit(&self) {
        if let Ok(manager) = self.manager() {
            manager.on_exit();
        }
    }

    fn set_exit_predicate(&self, predicate: Option<ExitPredicate>) {
        if let Ok(manager) = self.manager() {
            *manager.inner.exit_predicate.lock() = predicate;
        }
    }
}
