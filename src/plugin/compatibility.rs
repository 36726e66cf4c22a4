//! Provider API Compatibility
//!
//! Gate applied to provider descriptors declaring the API version they were
//! written against.

use crate::core::error::{AppError, AppResult};

include!(concat!(env!("OUT_DIR"), "/version_api.rs"));

/// Checker for provider API compatibility
#[derive(Debug, Clone, Copy)]
pub struct VersionCompatibilityChecker {
    api_version: u32,
}

impl VersionCompatibilityChecker {
    pub fn new(api_version: u32) -> Self {
        Self { api_version }
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Same major version (year) is compatible
    pub fn is_api_compatible(&self, provider_api_version: u32) -> bool {
        Self::major_version(self.api_version) == Self::major_version(provider_api_version)
    }

    /// Major version (year) of a YYYYMMDD API version
    pub fn major_version(api_version: u32) -> u32 {
        api_version / 10000
    }

    /// Check the API version declared by the descriptor found at `location`
    pub fn check_descriptor(&self, location: &str, declared: Option<u32>) -> AppResult<()> {
        match declared {
            Some(version) if !self.is_api_compatible(version) => Err(AppError::version_incompatible(format!(
                "Providers at '{}' require API version {} but current version is {}",
                location, version, self.api_version
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for VersionCompatibilityChecker {
    fn default() -> Self {
        Self::new(BASE_API_VERSION)
    }
}
