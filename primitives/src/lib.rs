//! `vmbridge-primitives`: types shared by both sides of the VM boundary.
//!
//! This crate provides the `#[repr(C)]` buffer protocol, the status codes
//! exchanged across the boundary, the callback gas cost table, module
//! checksums and the JSON environment payloads handed to entry points.

pub mod memory;
pub mod error;
pub mod gas;
pub mod types;
pub mod env;

// Re-export commonly used types at the crate root for convenience.
pub use memory::{ByteSliceView, UnmanagedVector, destroy_unmanaged_vector, new_unmanaged_vector};
pub use error::{CallbackStatus, ErrnoValue};
pub use types::{
    join_capabilities, parse_capabilities, AnalysisReport, Checksum, ChecksumError, Order, Record,
    MAX_KEY_LEN, MAX_VALUE_LEN,
};
pub use env::{BlockInfo, Coin, ContractInfo, Env, MessageInfo, TransactionInfo};
