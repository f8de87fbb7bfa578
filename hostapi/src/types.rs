//! Host-side configuration types.
//!
//! `CacheOptions` is what the surrounding application supplies when it opens
//! a module cache. Default values suit tests and local development.

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;
use vmbridge_primitives::types::join_capabilities;

/// Configuration for a module cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Directory holding the persisted wasm modules.
    pub data_dir: PathBuf,
    /// Capabilities the chain offers; modules requiring others are rejected.
    pub available_capabilities: BTreeSet<String>,
    /// Size of the in-memory module cache in MiB.
    pub memory_cache_size_mib: u32,
    /// Linear memory limit for a single contract instance in MiB.
    pub instance_memory_limit_mib: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheOptionsError {
    #[error("data directory must not be empty")]
    EmptyDataDir,

    #[error("data directory is not valid UTF-8")]
    NonUtf8DataDir,

    #[error("capability name {0:?} must be non-empty and must not contain ','")]
    InvalidCapability(String),

    #[error("instance memory limit must be at least 1 MiB")]
    ZeroMemoryLimit,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./wasm-cache"),
            available_capabilities: ["iterator", "staking"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            memory_cache_size_mib: 100,
            instance_memory_limit_mib: 32,
        }
    }
}

impl CacheOptions {
    /// Options rooted at `data_dir`, with defaults for everything else.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), CacheOptionsError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CacheOptionsError::EmptyDataDir);
        }
        if self.data_dir.to_str().is_none() {
            return Err(CacheOptionsError::NonUtf8DataDir);
        }
        if let Some(bad) = self
            .available_capabilities
            .iter()
            .find(|c| c.is_empty() || c.contains(','))
        {
            return Err(CacheOptionsError::InvalidCapability(bad.clone()));
        }
        if self.instance_memory_limit_mib == 0 {
            return Err(CacheOptionsError::ZeroMemoryLimit);
        }
        Ok(())
    }

    /// Capabilities in the comma-separated form the engine expects.
    pub fn capabilities_wire(&self) -> String {
        join_capabilities(&self.available_capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let options = CacheOptions::default();
        assert_eq!(options.memory_cache_size_mib, 100);
        assert_eq!(options.instance_memory_limit_mib, 32);
        assert_eq!(options.capabilities_wire(), "iterator,staking");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_new_keeps_defaults() {
        let options = CacheOptions::new("/tmp/vm").with_capabilities(["stargate"]);
        assert_eq!(options.data_dir, PathBuf::from("/tmp/vm"));
        assert_eq!(options.capabilities_wire(), "stargate");
        assert_eq!(options.instance_memory_limit_mib, 32);
    }

    #[test]
    fn test_validate_rejects() {
        let options = CacheOptions::new("");
        assert_eq!(options.validate(), Err(CacheOptionsError::EmptyDataDir));

        let options = CacheOptions::new("/tmp/vm").with_capabilities(["a,b"]);
        assert_eq!(
            options.validate(),
            Err(CacheOptionsError::InvalidCapability("a,b".to_string()))
        );

        let options = CacheOptions {
            instance_memory_limit_mib: 0,
            ..CacheOptions::new("/tmp/vm")
        };
        assert_eq!(options.validate(), Err(CacheOptionsError::ZeroMemoryLimit));
    }

    #[test]
    fn test_clone_eq() {
        let options = CacheOptions::default();
        assert_eq!(options.clone(), options);
    }
}
