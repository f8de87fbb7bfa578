//! Key/value storage capability exposed to contracts.
//!
//! The surrounding application implements [`Storage`] over its own state.
//! During an entry-point call the callback bridge forwards the engine's
//! `read_db`, `write_db`, `remove_db` and `scan_db` callbacks to it.
//!
//! Implementations:
//! - `MemStore` (this crate), an in-memory `BTreeMap` for testing

use vmbridge_primitives::{Order, Record};
use crate::error::HostError;

/// A snapshot cursor over a key range.
///
/// Iterators live in the invocation frame until the call returns, so they
/// must own their data and be `Send`.
pub type StorageIterator = Box<dyn Iterator<Item = Record> + Send>;

/// Abstraction over contract storage.
pub trait Storage {
    /// Read the value for a key.
    ///
    /// Returns `Ok(None)` if the key does not exist. An existing key with an
    /// empty value returns `Ok(Some(vec![]))`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HostError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&mut self, key: &[u8]) -> Result<(), HostError>;

    /// Iterate over `[start, end)` in the given order.
    ///
    /// `None` bounds are open. The returned iterator does not observe writes
    /// made after it was created.
    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<StorageIterator, HostError>;
}
