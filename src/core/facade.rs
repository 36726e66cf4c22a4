//! Facade and Host Contracts
//!
//! [`Facade`] is what a managed application sees of the launcher;
//! [`Host`] is what the launcher needs from its embedding (window, display,
//! progress reporting and process exit).

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use log::{debug, info};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::error::AppResult;
use crate::core::executor::TaskFuture;
use crate::plugin::traits::Renderable;
use crate::task::{ProgressSink, Task};

/// Opaque handle of the host window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Predicate deciding whether the application may exit
pub type ExitPredicate = Box<dyn Fn() -> bool + Send + Sync>;

/// Result of an upgrade run on the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The patched application has been created and initialized
    Upgraded { from: String, to: String },
    /// A task was canceled; the host has been asked to exit
    Abandoned,
}

/// Callbacks available to the managed application
pub trait Facade: Send + Sync {
    fn host_window_handle(&self) -> Option<WindowHandle>;

    /// Task checking for a newer version of the running application
    fn check_for_update(&self) -> AppResult<Task<Option<String>>>;

    /// Schedule an upgrade on the launcher worker
    fn upgrade(&self) -> AppResult<TaskFuture<AppResult<UpgradeOutcome>>>;

    /// Notify the launcher that the application wants to exit
    fn on_exit(&self);

    /// Register the predicate consulted before exiting; `None` clears it
    fn set_exit_predicate(&self, predicate: Option<ExitPredicate>);
}

/// The embedding of the launcher
pub trait Host: Send + Sync {
    fn window_handle(&self) -> Option<WindowHandle> {
        None
    }

    /// Display what a graphical application returned from its initialization
    fn show(&self, scene: Box<dyn Renderable>) -> AppResult<()>;

    /// Sink for long running tasks; the log is used when `None`
    fn progress_sink(&self) -> Option<Arc<dyn ProgressSink>> {
        None
    }

    fn icon_added(&self, _icon: &Path) {}

    fn icon_removed(&self, _icon: &Path) {}

    /// Ask the whole process to shut down
    fn request_exit(&self);
}

/// Host without any display, used by the command line launcher
#[derive(Default)]
pub struct HeadlessHost {
    exit_signal: Option<Arc<Notify>>,
    exit_requests: AtomicUsize,
    shown: AtomicUsize,
    icons: Mutex<Vec<String>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host waking `signal` when an exit is requested
    pub fn with_exit_signal(signal: Arc<Notify>) -> Self {
        Self {
            exit_signal: Some(signal),
            ..Self::default()
        }
    }

    pub fn exit_requests(&self) -> usize {
        self.exit_requests.load(Ordering::SeqCst)
    }

    /// Number of scenes handed to [`Host::show`]
    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::SeqCst)
    }

    /// Icons currently displayed
    pub fn icons(&self) -> Vec<String> {
        self.icons.lock().clone()
    }
}

impl Host for HeadlessHost {
    fn show(&self, _scene: Box<dyn Renderable>) -> AppResult<()> {
        self.shown.fetch_add(1, Ordering::SeqCst);
        debug!("No display available, the scene is discarded");
        Ok(())
    }

    fn icon_added(&self, icon: &Path) {
        self.icons.lock().push(icon.display().to_string());
    }

    fn icon_removed(&self, icon: &Path) {
        let icon = icon.display().to_string();
        self.icons.lock().retain(|known| *known != icon);
    }

    fn request_exit(&self) {
        self.exit_requests.fetch_add(1, Ordering::SeqCst);
        info!("Exit requested");
        if let Some(signal) = &self.exit_signal {
            signal.notify_one();
        }
    }
}

impl fmt::Debug for HeadlessHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessHost")
            .field("exit_requests", &self.exit_requests())
            .field("shown", &self.shown())
            .finish()
    }
}
