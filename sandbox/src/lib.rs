//! `vmbridge-sandbox`: Wasmtime-based contract engine.
//!
//! This crate stores, validates and runs contract modules on behalf of a
//! host reached only through C-compatible callback tables. It enforces:
//!
//! - **Determinism:** No SIMD, no threads, NaN canonicalization
//! - **Gas metering:** Fuel equals gas; host-reported callback gas is deducted
//! - **Memory limits:** Bounded linear memory growth per instance
//! - **Import whitelisting:** Only known `env` imports allowed, no WASI
//! - **Capabilities:** Contracts may only require capabilities the chain offers
//!
//! Hosts drive it through the exports in [`ffi`]; Rust callers can use
//! [`Cache`] directly.

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod runtime;
pub mod backend;
pub mod db;
pub mod iterator;
pub mod api;
pub mod querier;
pub mod entry_points;
pub mod cache;
pub mod ffi;

pub use error::VmError;
pub use config::CacheConfig;
pub use backend::{Backend, BackendError, BackendResult, GasInfo};
pub use db::{db_t, gas_meter_t, Db, DbVtable};
pub use iterator::{iterator_t, DbIter, IteratorVtable};
pub use api::{api_t, Api, ApiVtable};
pub use querier::{querier_t, Querier, QuerierVtable};
pub use entry_points::EntryPoint;
pub use cache::{Cache, Metrics};
pub use ffi::{cache_t, RawAnalysisReport};
pub use vmbridge_primitives::{destroy_unmanaged_vector, new_unmanaged_vector};
