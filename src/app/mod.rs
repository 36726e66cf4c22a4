//! Launcher orchestration module

pub mod execution;
pub mod initialization;

pub use execution::{build_manager, run_launcher};
pub use initialization::{configure_logging, load_settings, resolve_root};
