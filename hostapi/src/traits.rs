//! Address and query capabilities exposed to contracts.
//!
//! The callback bridge forwards the engine's `humanize_address`,
//! `canonicalize_address` and `query_external` callbacks to these traits.
//! Storage has its own module, see [`crate::storage`].

use crate::error::HostError;

/// Converts between the human-readable and canonical (binary) address forms.
///
/// Invalid input should be reported as [`HostError::User`] so the contract
/// sees a recoverable error rather than an aborted call.
pub trait AddressCodec {
    fn humanize(&self, canonical: &[u8]) -> Result<String, HostError>;

    fn canonicalize(&self, human: &str) -> Result<Vec<u8>, HostError>;
}

/// Answers queries a contract makes against the rest of the chain.
///
/// Requests and responses are opaque bytes; the bridge forwards them unchanged.
pub trait Querier {
    /// Run `request` with at most `gas_limit` gas.
    fn query_raw(&self, request: &[u8], gas_limit: u64) -> Result<Vec<u8>, HostError>;
}
