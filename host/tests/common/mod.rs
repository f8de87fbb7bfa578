//! Shared test helpers for integration tests.
//!
//! Provides WAT contracts, env payloads, capability fixtures and cache
//! factory functions used across all integration test files.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vmbridge_host::{init_cache, store_code, Cache, Capabilities};
use vmbridge_hostapi::{
    AddressCodec, CacheOptions, HostError, MemStore, MockApi, MockQuerier, Storage,
    StorageIterator,
};
use vmbridge_primitives::{BlockInfo, Checksum, Coin, ContractInfo, Env, MessageInfo, Order, Record};

pub const GAS_LIMIT: u64 = 10_000_000;

// ── Contracts ──

/// Key/value contract.
///
/// - `instantiate` stores the info payload under `owner`
/// - `execute` stores the message under `data`
/// - `query` returns the value of the key given as message (empty if absent)
/// - `migrate` removes the key given as message
pub const KV: &str = r#"
    (module
        (import "env" "db_read" (func $db_read (param i32 i32 i32 i32) (result i32)))
        (import "env" "db_write" (func $db_write (param i32 i32 i32 i32) (result i32)))
        (import "env" "db_remove" (func $db_remove (param i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "data")
        (data (i32.const 32) "owner")
        (func (export "instantiate")
            (param $env i32) (param $env_len i32)
            (param $info i32) (param $info_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (drop (call $db_write (i32.const 32) (i32.const 5) (local.get $info) (local.get $info_len)))
            i32.const 0)
        (func (export "execute")
            (param $env i32) (param $env_len i32)
            (param $info i32) (param $info_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (drop (call $db_write (i32.const 16) (i32.const 4) (local.get $msg) (local.get $msg_len)))
            i32.const 0)
        (func (export "query")
            (param $env i32) (param $env_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (drop (call $db_read (local.get $msg) (local.get $msg_len) (local.get $out_ptr) (local.get $out_len)))
            i32.const 0)
        (func (export "migrate")
            (param $env i32) (param $env_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (drop (call $db_remove (local.get $msg) (local.get $msg_len)))
            i32.const 0)
    )
"#;

/// `query` returns `db_read`'s status for the key given as message, followed
/// by the value when one was found.
pub const READ_STATUS: &str = r#"
    (module
        (import "env" "db_read" (func $db_read (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "query")
            (param i32 i32) (param $msg i32) (param $msg_len i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (local $status i32) (local $ptr i32) (local $len i32)
            (local.set $status (call $db_read (local.get $msg) (local.get $msg_len) (i32.const 32) (i32.const 36)))
            (local.set $ptr (i32.load (i32.const 32)))
            (local.set $len (i32.load (i32.const 36)))
            (i32.store8 (i32.const 1024) (local.get $status))
            (memory.copy (i32.const 1025) (local.get $ptr) (local.get $len))
            (i32.store (local.get $out_ptr) (i32.const 1024))
            (i32.store (local.get $out_len) (i32.add (local.get $len) (i32.const 1)))
            i32.const 0)
    )
"#;

/// Iterator contract.
///
/// - `query` counts all records in ascending order and returns the count as one byte
/// - `execute` returns the key of the last record
/// - `migrate` opens an iterator and then traps
pub const ITER: &str = r#"
    (module
        (import "env" "db_scan" (func $db_scan (param i32 i32 i32 i32 i32) (result i32)))
        (import "env" "db_next" (func $db_next (param i32 i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "query")
            (param i32 i32 i32 i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (local $it i32) (local $count i32)
            (local.set $it (call $db_scan (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 1)))
            (block $done
                (loop $next
                    (br_if $done (call $db_next (local.get $it) (i32.const 64) (i32.const 68) (i32.const 72) (i32.const 76)))
                    (local.set $count (i32.add (local.get $count) (i32.const 1)))
                    (br $next)))
            (i32.store8 (i32.const 128) (local.get $count))
            (i32.store (local.get $out_ptr) (i32.const 128))
            (i32.store (local.get $out_len) (i32.const 1))
            i32.const 0)
        (func (export "execute")
            (param i32 i32 i32 i32 i32 i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (drop (call $db_next
                (call $db_scan (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 2))
                (local.get $out_ptr) (local.get $out_len) (i32.const 72) (i32.const 76)))
            i32.const 0)
        (func (export "migrate") (param i32 i32 i32 i32 i32 i32) (result i32)
            (drop (call $db_scan (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 0) (i32.const 1)))
            unreachable)
    )
"#;

/// Address contract: `query` canonicalizes the message, `migrate` humanizes
/// it. A user error from the host is returned as the contract error.
pub const ADDR: &str = r#"
    (module
        (import "env" "addr_canonicalize" (func $canonicalize (param i32 i32 i32 i32) (result i32)))
        (import "env" "addr_humanize" (func $humanize (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "query")
            (param i32 i32) (param $msg i32) (param $msg_len i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (call $canonicalize (local.get $msg) (local.get $msg_len) (local.get $out_ptr) (local.get $out_len)))
        (func (export "migrate")
            (param i32 i32) (param $msg i32) (param $msg_len i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (call $humanize (local.get $msg) (local.get $msg_len) (local.get $out_ptr) (local.get $out_len)))
    )
"#;

/// `query` forwards the message to `query_chain` and returns its answer.
pub const QUERIER: &str = r#"
    (module
        (import "env" "query_chain" (func $query_chain (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (func (export "query")
            (param i32 i32) (param $msg i32) (param $msg_len i32) (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (call $query_chain (local.get $msg) (local.get $msg_len) (local.get $out_ptr) (local.get $out_len)))
    )
"#;

/// Exports every IBC hook; each echoes its message.
pub const IBC: &str = r#"
    (module
        (import "env" "debug" (func $debug (param i32 i32)))
        (memory (export "memory") 1)
        (func $echo (param $msg i32) (param $msg_len i32) (param $out_ptr i32) (param $out_len i32) (result i32)
            (call $debug (local.get $msg) (local.get $msg_len))
            (i32.store (local.get $out_ptr) (local.get $msg))
            (i32.store (local.get $out_len) (local.get $msg_len))
            i32.const 0)
        (func (export "ibc_channel_open") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
        (func (export "ibc_channel_connect") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
        (func (export "ibc_channel_close") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
        (func (export "ibc_packet_receive") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
        (func (export "ibc_packet_ack") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
        (func (export "ibc_packet_timeout") (param i32 i32 i32 i32 i32 i32) (result i32)
            (call $echo (local.get 2) (local.get 3) (local.get 4) (local.get 5)))
    )
"#;

/// Declares the `staking` capability; `query` succeeds without doing anything.
pub const STAKING: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "requires_staking"))
        (func (export "query") (param i32 i32 i32 i32 i32 i32) (result i32)
            i32.const 0)
    )
"#;

/// `query` returns a contract error with message "boom"; `execute` loops forever.
pub const FAILING: &str = r#"
    (module
        (memory (export "memory") 1)
        (data (i32.const 16) "boom")
        (func (export "query") (param i32 i32 i32 i32) (param $out_ptr i32) (param $out_len i32) (result i32)
            (i32.store (local.get $out_ptr) (i32.const 16))
            (i32.store (local.get $out_len) (i32.const 4))
            i32.const 1)
        (func (export "execute") (param i32 i32 i32 i32 i32 i32 i32 i32) (result i32)
            (loop $l (br $l))
            i32.const 0)
    )
"#;

pub fn wasm(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).unwrap()
}

// ── Payloads ──

pub fn env() -> Vec<u8> {
    let env = Env {
        block: BlockInfo {
            height: 12_345,
            time: 1_571_797_419_879_305_533,
            chain_id: "testing".to_string(),
        },
        transaction: None,
        contract: ContractInfo {
            address: "contract0".to_string(),
        },
    };
    serde_json::to_vec(&env).unwrap()
}

pub fn info(sender: &str, funds: Vec<Coin>) -> Vec<u8> {
    serde_json::to_vec(&MessageInfo {
        sender: sender.to_string(),
        funds,
    })
    .unwrap()
}

// ── Cache Factory ──

pub fn new_cache(dir: &tempfile::TempDir) -> Cache {
    let options =
        CacheOptions::new(dir.path()).with_capabilities(["iterator", "staking", "stargate"]);
    init_cache(&options).unwrap()
}

/// Cache with `wat` already stored.
pub fn setup(wat: &str) -> (tempfile::TempDir, Cache, Checksum) {
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&dir);
    let checksum = store_code(&cache, &wasm(wat)).unwrap();
    (dir, cache, checksum)
}

// ── Capabilities ──

pub fn caps<'a>(store: &'a mut dyn Storage, querier: &'a MockQuerier) -> Capabilities<'a> {
    Capabilities {
        store,
        api: &MockApi,
        querier,
    }
}

/// Store whose operations all fail or panic.
pub struct BrokenStore {
    pub panic: bool,
}

impl Storage for BrokenStore {
    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        if self.panic {
            panic!("store exploded");
        }
        Err(HostError::internal("store offline"))
    }

    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<(), HostError> {
        if self.panic {
            panic!("store exploded");
        }
        Err(HostError::internal("store offline"))
    }

    fn remove(&mut self, _key: &[u8]) -> Result<(), HostError> {
        Err(HostError::internal("store offline"))
    }

    fn range(
        &self,
        _start: Option<&[u8]>,
        _end: Option<&[u8]>,
        _order: Order,
    ) -> Result<StorageIterator, HostError> {
        Err(HostError::internal("store offline"))
    }
}

/// Iterator that records when it is dropped.
pub struct TrackedIter {
    records: std::vec::IntoIter<Record>,
    dropped: Arc<AtomicBool>,
}

impl Iterator for TrackedIter {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.records.next()
    }
}

impl Drop for TrackedIter {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// `MemStore` whose iterators report when they are released.
pub struct TrackingStore {
    pub inner: MemStore,
    pub dropped: Arc<AtomicBool>,
}

impl TrackingStore {
    pub fn new(inner: MemStore) -> Self {
        Self {
            inner,
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn iterator_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl Storage for TrackingStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HostError> {
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), HostError> {
        self.inner.remove(key)
    }

    fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<StorageIterator, HostError> {
        let records: Vec<Record> = self.inner.range(start, end, order)?.collect();
        Ok(Box::new(TrackedIter {
            records: records.into_iter(),
            dropped: Arc::clone(&self.dropped),
        }))
    }
}

pub fn store_with(pairs: &[(&str, &str)]) -> MemStore {
    let mut store = MemStore::new();
    for (k, v) in pairs {
        store.insert(k.as_bytes().to_vec(), v.as_bytes().to_vec());
    }
    store
}

/// Address codec that always panics.
pub struct PanickingApi;

impl AddressCodec for PanickingApi {
    fn humanize(&self, _canonical: &[u8]) -> Result<String, HostError> {
        panic!("humanize exploded")
    }

    fn canonicalize(&self, _human: &str) -> Result<Vec<u8>, HostError> {
        panic!("canonicalize exploded")
    }
}
