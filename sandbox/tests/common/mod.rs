//! Shared test helpers for integration tests.
//!
//! Provides WAT contracts, stub callback tables and cache factory functions
//! used across all integration test files.

#![allow(dead_code)]

use std::collections::BTreeSet;

use vmbridge_primitives::{ByteSliceView, Checksum, UnmanagedVector, MAX_VALUE_LEN};
use vmbridge_sandbox::{
    db_t, gas_meter_t, Api, ApiVtable, Backend, Cache, CacheConfig, Db, DbVtable, Querier,
    QuerierVtable,
};

pub const ENV: &[u8] = br#"{"block":{"height":12345,"time":"1571797419879305533","chain_id":"testing"},"transaction":{"index":3},"contract":{"address":"contract0"}}"#;
pub const INFO: &[u8] = br#"{"sender":"creator","funds":[]}"#;

// ── Contracts ──

/// `query` echoes the message; `instantiate` returns the info payload.
pub const ECHO: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "instantiate")
            (param $env i32) (param $env_len i32)
            (param $info i32) (param $info_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (i32.store (local.get $out_ptr) (local.get $info))
            (i32.store (local.get $out_len) (local.get $info_len))
            i32.const 0)
        (func (export "query")
            (param $env i32) (param $env_len i32)
            (param $msg i32) (param $msg_len i32)
            (param $out_ptr i32) (param $out_len i32)
            (result i32)
            (i32.store (local.get $out_ptr) (local.get $msg))
            (i32.store (local.get $out_len) (local.get $msg_len))
            i32.const 0)
    )
"#;

/// `execute` writes `key=key` once through `db_write`.
pub const WRITER: &str = r#"
    (module
        (import "env" "db_write" (func $db_write (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "key")
        (func (export "execute") (param i32 i32 i32 i32 i32 i32 i32 i32) (result i32)
            (drop (call $db_write (i32.const 16) (i32.const 3) (i32.const 16) (i32.const 3)))
            i32.const 0)
    )
"#;

/// `query` reads `key` through `db_read`.
pub const READER: &str = r#"
    (module
        (import "env" "db_read" (func $db_read (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "key")
        (func (export "query") (param i32 i32 i32 i32) (param $out_ptr i32) (param $out_len i32) (result i32)
            (drop (call $db_read (i32.const 16) (i32.const 3) (local.get $out_ptr) (local.get $out_len)))
            i32.const 0)
    )
"#;

/// `query` grows memory by one page of its own, puts a marker at its start,
/// reads `key` twice and returns the four marker bytes.
pub const GROW_THEN_READ: &str = r#"
    (module
        (import "env" "db_read" (func $db_read (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (data (i32.const 16) "key")
        (func (export "query") (param i32 i32 i32 i32) (param $out_ptr i32) (param $out_len i32) (result i32)
            (local $page i32)
            (local.set $page (i32.mul (memory.grow (i32.const 1)) (i32.const 65536)))
            (i32.store (local.get $page) (i32.const 0x77777777))
            (drop (call $db_read (i32.const 16) (i32.const 3) (i32.const 32) (i32.const 36)))
            (drop (call $db_read (i32.const 16) (i32.const 3) (i32.const 32) (i32.const 36)))
            (i32.store (local.get $out_ptr) (local.get $page))
            (i32.store (local.get $out_len) (i32.const 4))
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

/// `query` never returns.
pub const LOOPER: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "query") (param i32 i32 i32 i32 i32 i32) (result i32)
            (loop $l (br $l))
            i32.const 0)
    )
"#;

/// `query` grows memory by 100 pages and fails if the grow was refused.
pub const GROWER: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "query") (param i32 i32 i32 i32 i32 i32) (result i32)
            (i32.eq (memory.grow (i32.const 100)) (i32.const -1)))
    )
"#;

/// `query` executes `unreachable`.
pub const TRAPPER: &str = r#"
    (module
        (memory (export "memory") 1)
        (func (export "query") (param i32 i32 i32 i32 i32 i32) (result i32)
            unreachable)
    )
"#;

pub fn wasm(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).unwrap()
}

// ── Cache Factory ──

pub fn capabilities(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|c| c.to_string()).collect()
}

pub fn new_cache(dir: &tempfile::TempDir) -> Cache {
    Cache::new(CacheConfig {
        data_dir: dir.path().to_path_buf(),
        available_capabilities: capabilities(&["iterator", "staking"]),
        ..CacheConfig::default()
    })
    .unwrap()
}

pub fn new_cache_with_memory_limit(dir: &tempfile::TempDir, mib: u32) -> Cache {
    Cache::new(CacheConfig {
        data_dir: dir.path().to_path_buf(),
        instance_memory_limit_mib: mib,
        ..CacheConfig::default()
    })
    .unwrap()
}

/// Cache with `wat` already stored.
pub fn cache_with(wat: &str) -> (tempfile::TempDir, Cache, Checksum) {
    let dir = tempfile::tempdir().unwrap();
    let cache = new_cache(&dir);
    let checksum = cache.save_wasm(&wasm(wat)).unwrap();
    (dir, cache, checksum)
}

// ── Stub Callbacks ──

pub extern "C" fn write_free(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    _used_gas: *mut u64,
    _key: ByteSliceView,
    _value: ByteSliceView,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    0
}

pub extern "C" fn write_costs_1000(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    _key: ByteSliceView,
    _value: ByteSliceView,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    unsafe { *used_gas = 1000 };
    0
}

pub extern "C" fn write_out_of_gas(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    _key: ByteSliceView,
    _value: ByteSliceView,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    unsafe { *used_gas = 10 };
    -3
}

pub extern "C" fn write_panicked(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    _used_gas: *mut u64,
    _key: ByteSliceView,
    _value: ByteSliceView,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    unsafe { *error_msg_out = UnmanagedVector::some(b"host panicked".to_vec()) };
    -1
}

/// Every key holds `stored`.
pub extern "C" fn read_constant(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    _key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    unsafe {
        *used_gas = 7;
        *value_out = UnmanagedVector::some(b"stored".to_vec());
    }
    0
}

/// Every key holds a value of the largest allowed size.
pub extern "C" fn read_largest(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    _used_gas: *mut u64,
    _key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    unsafe { *value_out = UnmanagedVector::some(vec![0xab; MAX_VALUE_LEN]) };
    0
}

/// `empty` holds an empty value, every other key is absent.
pub extern "C" fn read_only_empty(
    _db: *mut db_t,
    _gas_meter: *mut gas_meter_t,
    _used_gas: *mut u64,
    key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    _error_msg_out: *mut UnmanagedVector,
) -> i32 {
    let key = unsafe { key.read() }.unwrap_or_default();
    if key == b"empty" {
        unsafe { *value_out = UnmanagedVector::some(Vec::new()) };
    }
    0
}

pub fn backend_with(vtable: DbVtable) -> Backend {
    Backend {
        db: Db {
            gas_meter: std::ptr::null_mut(),
            state: std::ptr::null_mut(),
            vtable,
        },
        api: Api {
            state: std::ptr::null(),
            vtable: ApiVtable::default(),
        },
        querier: Querier {
            state: std::ptr::null(),
            vtable: QuerierVtable::default(),
        },
    }
}

pub fn empty_backend() -> Backend {
    backend_with(DbVtable::default())
}
