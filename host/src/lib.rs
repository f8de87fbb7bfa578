//! `vmbridge-host`: the host side of the contract VM boundary.
//!
//! This crate lets an application run contracts in the engine while keeping
//! its own state, address rules and query routing. It provides:
//!
//! - Module lifecycle calls (`init_cache`, `store_code`, `pin`, ...)
//! - The ten contract entry points, each returning `(Result, gas_used)`
//! - Callback tables that expose [`Capabilities`] to the engine
//! - Invocation frames that scope iterators to a single call
//!
//! Host capabilities are the traits from `vmbridge-hostapi`.

pub mod error;
pub mod frame;
pub mod callbacks;
pub mod calls;

pub use error::{error_with_message, VmError};
pub use frame::FrameGuard;
pub use callbacks::CallbackTable;
pub use calls::{
    analyze_code, execute, get_code, get_metrics, ibc_channel_close, ibc_channel_connect,
    ibc_channel_open, ibc_packet_ack, ibc_packet_receive, ibc_packet_timeout, init_cache,
    instantiate, migrate, pin, query, release_cache, store_code, unpin, Cache, CallOutput,
    Capabilities,
};
pub use vmbridge_sandbox::Metrics;
