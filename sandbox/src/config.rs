//! Engine configuration.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Bytes in one wasm page.
pub const WASM_PAGE_SIZE: u64 = 65536;

const MI: u64 = 1024 * 1024;

/// Configuration for a module cache and the instances it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root directory; modules are stored under `<data_dir>/wasm`.
    pub data_dir: PathBuf,

    /// Capabilities the chain offers to contracts.
    pub available_capabilities: BTreeSet<String>,

    /// In-memory module cache budget in MiB. Default: 100 MiB.
    pub memory_cache_size_mib: u32,

    /// Linear memory limit per contract instance in MiB.
    /// Default: 32 MiB = 512 pages.
    pub instance_memory_limit_mib: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./wasm-cache"),
            available_capabilities: BTreeSet::new(),
            memory_cache_size_mib: 100,
            instance_memory_limit_mib: 32,
        }
    }
}

impl CacheConfig {
    pub fn memory_cache_size_bytes(&self) -> usize {
        (self.memory_cache_size_mib as u64 * MI) as usize
    }

    pub fn instance_memory_limit_bytes(&self) -> usize {
        (self.instance_memory_limit_mib as u64 * MI) as usize
    }

    /// Largest linear memory an instance may reach, in pages.
    pub fn max_memory_pages(&self) -> u64 {
        self.instance_memory_limit_bytes() as u64 / WASM_PAGE_SIZE
    }
}
