//! Gas cost table for host callbacks.
//!
//! Both sides of the boundary price callbacks with these functions: the host
//! reports the cost through the `used_gas` out-parameter, the engine deducts
//! it from the remaining fuel. All arithmetic saturates.

// ── Base costs ──

/// Base cost for a store read.
pub const G_STATE_GET: u64 = 200;

/// Base cost for a store write.
pub const G_STATE_SET: u64 = 500;

/// Base cost for a store remove.
pub const G_STATE_DEL: u64 = 300;

/// Base cost for opening a range iterator.
pub const G_STATE_SCAN: u64 = 400;

/// Base cost for advancing an iterator.
pub const G_ITER_NEXT: u64 = 100;

/// Per-byte cost added to every operation that moves bytes.
pub const G_PER_BYTE: u64 = 3;

/// Base cost for turning a canonical address into its human form.
pub const G_HUMANIZE: u64 = 150;

/// Base cost for turning a human address into its canonical form.
pub const G_CANONICALIZE: u64 = 150;

/// Base cost for a cross-contract query, excluding the gas the query itself uses.
pub const G_QUERY: u64 = 1000;

/// Base cost for the guest debug hook.
pub const G_DEBUG: u64 = 10;

fn with_bytes(base: u64, byte_count: usize) -> u64 {
    base.saturating_add((byte_count as u64).saturating_mul(G_PER_BYTE))
}

pub fn gas_cost_read(key_len: usize, value_len: usize) -> u64 {
    with_bytes(G_STATE_GET, key_len.saturating_add(value_len))
}

pub fn gas_cost_write(key_len: usize, value_len: usize) -> u64 {
    with_bytes(G_STATE_SET, key_len.saturating_add(value_len))
}

pub fn gas_cost_remove(key_len: usize) -> u64 {
    with_bytes(G_STATE_DEL, key_len)
}

/// Cost of opening an iterator over `[start, end)`.
pub fn gas_cost_scan(start_len: usize, end_len: usize) -> u64 {
    with_bytes(G_STATE_SCAN, start_len.saturating_add(end_len))
}

/// Cost of one iterator step; `record_len` is key + value, `0` at the end.
pub fn gas_cost_next(record_len: usize) -> u64 {
    with_bytes(G_ITER_NEXT, record_len)
}

pub fn gas_cost_humanize(canonical_len: usize) -> u64 {
    with_bytes(G_HUMANIZE, canonical_len)
}

pub fn gas_cost_canonicalize(human_len: usize) -> u64 {
    with_bytes(G_CANONICALIZE, human_len)
}

pub fn gas_cost_query(request_len: usize) -> u64 {
    with_bytes(G_QUERY, request_len)
}

pub fn gas_cost_debug(msg_len: usize) -> u64 {
    with_bytes(G_DEBUG, msg_len)
}
