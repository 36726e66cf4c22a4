//! Application Error Types
//!
//! Error taxonomy for the lifecycle, configuration, discovery and task layers.

use std::error::Error as StdError;
use thiserror::Error;

use crate::core::state::ApplicationState;

/// Result type for lifecycle and plugin operations
pub type AppResult<T> = Result<T, AppError>;

/// Boxed cause carried by application level failures
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

/// Error types raised by the application manager and its collaborators
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or unreadable classpath entries, empty classpath, malformed configuration file
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No compliant application, no compatible version manager, unknown provider
    #[error("Discovery error: {message}")]
    Discovery { message: String },

    /// A provider descriptor targets an incompatible API version
    #[error("Version compatibility error: {message}")]
    VersionIncompatible { message: String },

    /// A lifecycle operation was attempted from the wrong state
    #[error("Could not {operation} the application as the state is illegal: {actual}")]
    IllegalState {
        operation: &'static str,
        actual: ApplicationState,
    },

    /// A task noticed that it was canceled
    #[error("The task '{task}' has been interrupted")]
    Interrupted { task: String },

    /// Failure raised by, or wrapped around, application or version manager code
    #[error("{message}")]
    Application {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// I/O failure with the path or operation that caused it
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Work submitted to a stopped executor
    #[error("Task rejected: {message}")]
    Rejected { message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a discovery error
    pub fn discovery<S: Into<String>>(message: S) -> Self {
        Self::Discovery { message: message.into() }
    }

    /// Create a version incompatible error
    pub fn version_incompatible<S: Into<String>>(message: S) -> Self {
        Self::VersionIncompatible { message: message.into() }
    }

    /// Create an illegal state error
    pub fn illegal_state(operation: &'static str, actual: ApplicationState) -> Self {
        Self::IllegalState { operation, actual }
    }

    /// Create an interrupted error
    pub fn interrupted<S: Into<String>>(task: S) -> Self {
        Self::Interrupted { task: task.into() }
    }

    /// Create an application error without cause
    pub fn application<S: Into<String>>(message: S) -> Self {
        Self::Application { message: message.into(), source: None }
    }

    /// Create an application error wrapping a cause
    pub fn application_with<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxedCause>,
    {
        Self::Application { message: message.into(), source: Some(source.into()) }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Io { message: message.into(), source }
    }

    /// Create a rejection error
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        Self::Rejected { message: message.into() }
    }

    /// Wrap a panic payload caught while calling into plugin code
    pub fn from_panic<S: Into<String>>(message: S, payload: Box<dyn std::any::Any + Send>) -> Self {
        let detail = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::application_with(message, PanicCause(detail))
    }

    /// Check if the error reports a failed state precondition
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, AppError::IllegalState { .. })
    }

    /// Check if the error reports a canceled task
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AppError::Interrupted { .. })
    }

    /// The state observed by a failed precondition, if any
    pub fn actual_state(&self) -> Option<ApplicationState> {
        match self {
            AppError::IllegalState { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

/// Cause recorded when plugin code panics
#[derive(Debug, Error)]
#[error("panic: {0}")]
pub struct PanicCause(pub String);

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::io("IO error", err)
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::discovery(format!("Invalid provider descriptor: {}", err))
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        AppError::application_with("Invalid archive", err)
    }
}

impl From<java_properties::PropertiesError> for AppError {
    fn from(err: java_properties::PropertiesError) -> Self {
        AppError::configuration(format!("Invalid properties: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_state_message() {
        let error = AppError::illegal_state("init", ApplicationState::Unknown);
        assert_eq!(
            error.to_string(),
            "Could not init the application as the state is illegal: UNKNOWN"
        );
        assert!(error.is_illegal_state());
        assert_eq!(error.actual_state(), Some(ApplicationState::Unknown));
    }

    #[test]
    fn test_interrupted_classification() {
        let error = AppError::interrupted("fetch");
        assert!(error.is_interrupted());
        assert!(!error.is_illegal_state());
        assert_eq!(error.actual_state(), None);
    }

    #[test]
    fn test_application_error_keeps_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let error = AppError::application_with("Could not destroy the application", cause);
        assert_eq!(error.to_string(), "Could not destroy the application");
        let source = error.source().expect("cause expected");
        assert!(source.to_string().contains("disk gone"));
    }

    #[test]
    fn test_panic_payload_is_wrapped() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let error = AppError::from_panic("Could not init the application", payload);
        assert!(error.source().unwrap().to_string().contains("boom"));

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let error = AppError::from_panic("Could not init the application", payload);
        assert!(error.source().unwrap().to_string().contains("bang"));
    }

    #[test]
    fn test_io_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: AppError = io_error.into();
        assert!(matches!(error, AppError::Io { .. }));
        assert!(error.to_string().contains("File not found"));
    }
}
