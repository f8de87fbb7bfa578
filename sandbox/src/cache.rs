//! Module cache: wasm blobs on disk, compiled modules in memory.
//!
//! Lookup order is pinned → memory → filesystem. A filesystem hit compiles
//! the stored blob and inserts it into the memory cache, which evicts the
//! oldest entries once its size budget is exceeded. Pinned modules are never
//! evicted.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;

use parking_lot::{Mutex, RwLock};
use wasmtime::{Engine, Module};

use vmbridge_primitives::{AnalysisReport, Checksum, Env};

use crate::backend::Backend;
use crate::config::CacheConfig;
use crate::entry_points::EntryPoint;
use crate::error::VmError;
use crate::runtime::{self, CallOptions, CallResult};
use crate::validation;

const WASM_DIR: &str = "wasm";

/// Cache counters, as reported over the C ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub hits_pinned: u32,
    pub hits_memory: u32,
    pub hits_fs: u32,
    pub misses: u32,
    pub elements_pinned: u64,
    pub elements_memory: u64,
    /// Bytes of wasm behind the pinned modules.
    pub size_pinned: u64,
    /// Bytes of wasm behind the memory-cached modules.
    pub size_memory: u64,
}

#[derive(Clone)]
struct CachedModule {
    module: Module,
    /// Size of the wasm blob the module was compiled from.
    size: usize,
}

/// Size-bounded FIFO of compiled modules.
struct MemoryCache {
    entries: HashMap<Checksum, CachedModule>,
    order: VecDeque<Checksum>,
    size: usize,
    limit: usize,
}

impl MemoryCache {
    fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            size: 0,
            limit,
        }
    }

    fn get(&self, checksum: &Checksum) -> Option<&CachedModule> {
        self.entries.get(checksum)
    }

    fn insert(&mut self, checksum: Checksum, cached: CachedModule) {
        if cached.size > self.limit || self.entries.contains_key(&checksum) {
            return;
        }
        while self.size + cached.size > self.limit {
            match self.order.pop_front() {
                Some(oldest) => {
                    if let Some(evicted) = self.entries.remove(&oldest) {
                        self.size -= evicted.size;
                        tracing::debug!(checksum = %oldest, "evicted module from memory cache");
                    }
                }
                None => break,
            }
        }
        self.size += cached.size;
        self.order.push_back(checksum);
        self.entries.insert(checksum, cached);
    }

    fn remove(&mut self, checksum: &Checksum) -> Option<CachedModule> {
        let removed = self.entries.remove(checksum)?;
        self.size -= removed.size;
        self.order.retain(|c| c != checksum);
        Some(removed)
    }
}

struct Modules {
    memory: MemoryCache,
    pinned: HashMap<Checksum, CachedModule>,
}

#[derive(Default)]
struct Stats {
    hits_pinned: u32,
    hits_memory: u32,
    hits_fs: u32,
    misses: u32,
}

/// Where a module lookup was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Pinned,
    Memory,
    Fs,
}

/// A module cache bound to one data directory and engine.
///
/// Shared freely between threads; lookups take a read lock and only misses
/// take the write lock.
pub struct Cache {
    config: CacheConfig,
    engine: Engine,
    wasm_dir: PathBuf,
    modules: RwLock<Modules>,
    stats: Mutex<Stats>,
}

impl Cache {
    /// Create the cache, its engine and `<data_dir>/wasm`.
    pub fn new(config: CacheConfig) -> Result<Self, VmError> {
        let engine = runtime::create_engine(&config)?;
        let wasm_dir = config.data_dir.join(WASM_DIR);
        fs::create_dir_all(&wasm_dir).map_err(|e| {
            VmError::cache(format!("creating {}: {}", wasm_dir.display(), e))
        })?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            capabilities = ?config.available_capabilities,
            memory_cache_mib = config.memory_cache_size_mib,
            "initialized module cache"
        );

        let memory = MemoryCache::new(config.memory_cache_size_bytes());
        Ok(Self {
            config,
            engine,
            wasm_dir,
            modules: RwLock::new(Modules {
                memory,
                pinned: HashMap::new(),
            }),
            stats: Mutex::new(Stats::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn available_capabilities(&self) -> &BTreeSet<String> {
        &self.config.available_capabilities
    }

    fn wasm_path(&self, checksum: &Checksum) -> PathBuf {
        self.wasm_dir.join(checksum.to_hex())
    }

    fn compile(&self, wasm: &[u8]) -> Result<Module, VmError> {
        Module::new(&self.engine, wasm).map_err(|e| VmError::Compile(format!("{:#}", e)))
    }

    /// Validate and store a wasm blob. Storing the same code twice is a no-op
    /// returning the same checksum.
    pub fn save_wasm(&self, wasm: &[u8]) -> Result<Checksum, VmError> {
        let module = self.compile(wasm)?;
        validation::check_wasm(&module, self.available_capabilities())?;

        let checksum = Checksum::generate(wasm);
        let path = self.wasm_path(&checksum);
        if !path.exists() {
            fs::write(&path, wasm)
                .map_err(|e| VmError::cache(format!("writing {}: {}", path.display(), e)))?;
        }
        tracing::debug!(checksum = %checksum, size = wasm.len(), "stored wasm");

        self.modules.write().memory.insert(
            checksum,
            CachedModule {
                module,
                size: wasm.len(),
            },
        );
        Ok(checksum)
    }

    /// Return the stored wasm blob, checking it still hashes to `checksum`.
    pub fn load_wasm(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
        let path = self.wasm_path(checksum);
        let wasm = fs::read(&path).map_err(|e| {
            VmError::cache(format!("no wasm stored for {}: {}", checksum, e))
        })?;
        if Checksum::generate(&wasm) != *checksum {
            return Err(VmError::cache(format!(
                "stored wasm for {} is corrupted",
                checksum
            )));
        }
        Ok(wasm)
    }

    /// Compile from disk, count the outcome and return the module.
    fn load_from_fs(&self, checksum: &Checksum) -> Result<CachedModule, VmError> {
        let wasm = match self.load_wasm(checksum) {
            Ok(wasm) => wasm,
            Err(e) => {
                self.stats.lock().misses += 1;
                tracing::debug!(checksum = %checksum, "module cache miss");
                return Err(e);
            }
        };
        let module = self.compile(&wasm)?;
        Ok(CachedModule {
            module,
            size: wasm.len(),
        })
    }

    fn lookup(&self, checksum: &Checksum) -> Option<(CachedModule, Source)> {
        let modules = self.modules.read();
        if let Some(cached) = modules.pinned.get(checksum) {
            return Some((cached.clone(), Source::Pinned));
        }
        modules
            .memory
            .get(checksum)
            .map(|cached| (cached.clone(), Source::Memory))
    }

    fn record_hit(&self, source: Source) {
        let mut stats = self.stats.lock();
        match source {
            Source::Pinned => stats.hits_pinned += 1,
            Source::Memory => stats.hits_memory += 1,
            Source::Fs => stats.hits_fs += 1,
        }
    }

    /// Fetch a compiled module for execution.
    pub fn get_module(&self, checksum: &Checksum) -> Result<Module, VmError> {
        if let Some((cached, source)) = self.lookup(checksum) {
            self.record_hit(source);
            return Ok(cached.module);
        }

        let cached = self.load_from_fs(checksum)?;
        self.record_hit(Source::Fs);
        tracing::debug!(checksum = %checksum, "loaded module from disk");
        let module = cached.module.clone();
        self.modules.write().memory.insert(*checksum, cached);
        Ok(module)
    }

    /// Keep a module compiled for the lifetime of the cache.
    pub fn pin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.modules.read().pinned.contains_key(checksum) {
            return Ok(());
        }

        let from_memory = self.modules.write().memory.remove(checksum);
        let cached = match from_memory {
            Some(cached) => cached,
            None => self.load_from_fs(checksum)?,
        };
        self.modules.write().pinned.insert(*checksum, cached);
        tracing::info!(checksum = %checksum, "pinned module");
        Ok(())
    }

    /// Release a pin. Unpinning code that is not pinned is a no-op.
    pub fn unpin(&self, checksum: &Checksum) -> Result<(), VmError> {
        if self.modules.write().pinned.remove(checksum).is_some() {
            tracing::info!(checksum = %checksum, "unpinned module");
        }
        Ok(())
    }

    pub fn analyze(&self, checksum: &Checksum) -> Result<AnalysisReport, VmError> {
        let module = self.get_module(checksum)?;
        Ok(validation::analyze(&module))
    }

    pub fn metrics(&self) -> Metrics {
        let stats = self.stats.lock();
        let modules = self.modules.read();
        Metrics {
            hits_pinned: stats.hits_pinned,
            hits_memory: stats.hits_memory,
            hits_fs: stats.hits_fs,
            misses: stats.misses,
            elements_pinned: modules.pinned.len() as u64,
            elements_memory: modules.memory.entries.len() as u64,
            size_pinned: modules.pinned.values().map(|m| m.size as u64).sum(),
            size_memory: modules.memory.size as u64,
        }
    }

    /// Run an entry point of the stored module.
    #[allow(clippy::too_many_arguments)]
    pub fn call(
        &self,
        checksum: &Checksum,
        entry: EntryPoint,
        env: &[u8],
        info: Option<&[u8]>,
        msg: &[u8],
        backend: Backend,
        gas_limit: u64,
        print_debug: bool,
    ) -> CallResult {
        let module = match self.get_module(checksum) {
            Ok(module) => module,
            Err(e) => return (Err(e), 0),
        };
        if print_debug {
            if let Ok(env) = serde_json::from_slice::<Env>(env) {
                tracing::debug!(
                    entry = entry.name(),
                    height = env.block.height,
                    contract = %env.contract.address,
                    "calling contract"
                );
            }
        }
        let options = CallOptions {
            gas_limit,
            memory_limit_bytes: self.config.instance_memory_limit_bytes(),
            print_debug,
        };
        runtime::call_entry_point(
            &self.engine,
            &module,
            entry,
            env,
            info,
            msg,
            backend,
            options,
        )
    }
}
