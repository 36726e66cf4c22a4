//! Launcher Core
//!
//! Lifecycle state machine of the managed application, its configuration,
//! the serial worker running upgrades and the contracts shared with the
//! application and the host.

pub mod configuration;
pub mod error;
pub mod executor;
pub mod facade;
pub mod manager;
pub mod state;

#[cfg(test)]
pub mod tests;

pub use configuration::{Configuration, ConfigurationFactory};
pub use error::{AppError, AppResult};
pub use executor::{AsyncTaskExecutor, TaskFuture};
pub use facade::{ExitPredicate, Facade, HeadlessHost, Host, UpgradeOutcome, WindowHandle};
pub use manager::{ApplicationManager, InitErrorCallback, ManagerBuilder};
pub use state::{ApplicationState, StateCell};
