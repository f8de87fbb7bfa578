//! `vmbridge-hostapi`: capability traits and types for the host side of the VM boundary.
//!
//! This crate defines what the surrounding application implements and
//! supplies when it invokes a contract. It provides:
//!
//! - `Storage` trait, the contract key/value store
//! - `AddressCodec` and `Querier` traits
//! - `HostGasMeter`, the per-call host gas counter
//! - `MemStore`, `MockApi`, `MockQuerier` for testing
//! - `CacheOptions`, module cache configuration
//! - `HostError`, the capability error type with `CallbackStatus` conversion

pub mod error;
pub mod types;
pub mod gas_meter;
pub mod storage;
pub mod mem_store;
pub mod traits;
pub mod mock;

// Re-export commonly used types at the crate root.
pub use error::HostError;
pub use types::{CacheOptions, CacheOptionsError};
pub use gas_meter::HostGasMeter;
pub use storage::{Storage, StorageIterator};
pub use mem_store::MemStore;
pub use traits::{AddressCodec, Querier};
pub use mock::{MockApi, MockQuerier};
