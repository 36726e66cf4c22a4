//! appma: a launcher hosting one managed application, able to upgrade it
//! in place while the launcher keeps running.
//!
//! - [`core`]: lifecycle state machine, configuration, worker and facade
//! - [`task`]: observable, cancelable units of work and progress sinks
//! - [`plugin`]: provider registry, classpath modules and discovery
//! - [`io`]: folder copy/delete and zip extraction
//! - [`app`], [`cli`], [`config`], [`logging`]: the command line launcher

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod plugin;
pub mod task;
