//! C ABI exports of the engine.
//!
//! Every export validates its pointers, runs inside `catch_unwind` and
//! returns an [`ErrnoValue`] code. On failure a message is written to
//! `error_msg`, except for out of gas, which is signalled by the code alone.
//!
//! Ownership: vectors written to out pointers belong to the caller, which
//! must release them with `destroy_unmanaged_vector` or by consuming them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use vmbridge_primitives::{
    join_capabilities, parse_capabilities, ByteSliceView, Checksum, ErrnoValue, UnmanagedVector,
};

use crate::api::Api;
use crate::backend::Backend;
use crate::cache::{Cache, Metrics};
use crate::config::CacheConfig;
use crate::db::Db;
use crate::entry_points::EntryPoint;
use crate::error::VmError;
use crate::querier::Querier;

/// Opaque handle to a [`Cache`].
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct cache_t {
    _private: [u8; 0],
}

/// Analysis result in C layout. `required_capabilities` is comma separated.
#[repr(C)]
#[derive(Debug)]
pub struct RawAnalysisReport {
    pub has_ibc_entry_points: bool,
    pub required_capabilities: UnmanagedVector,
}

/// Write `err` to `error_msg` (unless out of gas) and return its code.
fn set_error(err: VmError, error_msg: *mut UnmanagedVector) -> i32 {
    let code = err.errno();
    if !matches!(err, VmError::OutOfGas) && !error_msg.is_null() {
        // SAFETY: checked non-null; the caller passes a writable slot
        unsafe { *error_msg = UnmanagedVector::some(err.to_string()) };
    }
    code.as_i32()
}

/// Run `f` with panics contained, turning the outcome into a status code.
fn guarded<F>(error_msg: *mut UnmanagedVector, f: F) -> i32
where
    F: FnOnce() -> Result<(), VmError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrnoValue::Success.as_i32(),
        Ok(Err(err)) => set_error(err, error_msg),
        Err(_) => {
            tracing::warn!("caught panic at the engine boundary");
            set_error(VmError::Panic, error_msg)
        }
    }
}

fn to_cache<'a>(ptr: *mut cache_t) -> Result<&'a Cache, VmError> {
    if ptr.is_null() {
        return Err(VmError::invalid_argument("cache pointer is null"));
    }
    // SAFETY: non-null handles come from `init_cache` and live until `release_cache`
    Ok(unsafe { &*(ptr as *const Cache) })
}

fn read_view<'a>(view: &'a ByteSliceView, name: &str) -> Result<&'a [u8], VmError> {
    // SAFETY: the caller keeps the viewed bytes alive for the whole call
    unsafe { view.read() }.ok_or_else(|| VmError::invalid_argument(format!("{} is nil", name)))
}

fn read_checksum(view: &ByteSliceView) -> Result<Checksum, VmError> {
    let bytes = read_view(view, "checksum")?;
    Checksum::try_from(bytes).map_err(|e| VmError::invalid_argument(e.to_string()))
}

fn write_out<T>(out: *mut T, value: T, name: &str) -> Result<(), VmError> {
    if out.is_null() {
        return Err(VmError::invalid_argument(format!("{} pointer is null", name)));
    }
    // SAFETY: checked non-null; the caller passes a writable slot
    unsafe { *out = value };
    Ok(())
}

fn cache_config(
    data_dir: ByteSliceView,
    available_capabilities: ByteSliceView,
    memory_cache_size: u32,
    instance_memory_limit: u32,
) -> Result<CacheConfig, VmError> {
    let data_dir = std::str::from_utf8(read_view(&data_dir, "data_dir")?)
        .map_err(|_| VmError::invalid_argument("data_dir is not UTF-8"))?;
    if data_dir.is_empty() {
        return Err(VmError::invalid_argument("data_dir is empty"));
    }
    let capabilities = std::str::from_utf8(read_view(&available_capabilities, "capabilities")?)
        .map_err(|_| VmError::invalid_argument("capabilities are not UTF-8"))?;
    if instance_memory_limit == 0 {
        return Err(VmError::invalid_argument("instance memory limit is zero"));
    }
    Ok(CacheConfig {
        data_dir: PathBuf::from(data_dir),
        available_capabilities: parse_capabilities(capabilities),
        memory_cache_size_mib: memory_cache_size,
        instance_memory_limit_mib: instance_memory_limit,
    })
}

// ── Cache lifecycle ──

#[no_mangle]
pub extern "C" fn init_cache(
    data_dir: ByteSliceView,
    available_capabilities: ByteSliceView,
    memory_cache_size: u32,
    instance_memory_limit: u32,
    out_cache: *mut *mut cache_t,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        if out_cache.is_null() {
            return Err(VmError::invalid_argument("out_cache pointer is null"));
        }
        let config = cache_config(
            data_dir,
            available_capabilities,
            memory_cache_size,
            instance_memory_limit,
        )?;
        let cache = Box::new(Cache::new(config)?);
        write_out(out_cache, Box::into_raw(cache) as *mut cache_t, "out_cache")
    })
}

/// Release a cache. Null is ignored.
///
/// # Safety
///
/// `cache` must come from `init_cache`, be released once, and not be in use
/// by any other call.
#[no_mangle]
pub unsafe extern "C" fn release_cache(cache: *mut cache_t) {
    if !cache.is_null() {
        // SAFETY: guaranteed by the caller
        let cache = unsafe { Box::from_raw(cache as *mut Cache) };
        tracing::info!(data_dir = %cache.config().data_dir.display(), "released module cache");
        drop(cache);
    }
}

#[no_mangle]
pub extern "C" fn save_wasm(
    cache: *mut cache_t,
    wasm: ByteSliceView,
    out_checksum: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        let wasm = read_view(&wasm, "wasm")?;
        let checksum = cache.save_wasm(wasm)?;
        write_out(
            out_checksum,
            UnmanagedVector::some(checksum.as_slice()),
            "out_checksum",
        )
    })
}

#[no_mangle]
pub extern "C" fn load_wasm(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    out_wasm: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        let checksum = read_checksum(&checksum)?;
        let wasm = cache.load_wasm(&checksum)?;
        write_out(out_wasm, UnmanagedVector::some(wasm), "out_wasm")
    })
}

#[no_mangle]
pub extern "C" fn pin(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        cache.pin(&read_checksum(&checksum)?)
    })
}

#[no_mangle]
pub extern "C" fn unpin(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        cache.unpin(&read_checksum(&checksum)?)
    })
}

#[no_mangle]
pub extern "C" fn analyze_code(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    out_report: *mut RawAnalysisReport,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        let report = cache.analyze(&read_checksum(&checksum)?)?;
        let raw = RawAnalysisReport {
            has_ibc_entry_points: report.has_ibc_entry_points,
            required_capabilities: UnmanagedVector::some(join_capabilities(&report.required_capabilities)),
        };
        write_out(out_report, raw, "out_report")
    })
}

#[no_mangle]
pub extern "C" fn get_metrics(
    cache: *mut cache_t,
    out_metrics: *mut Metrics,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        let cache = to_cache(cache)?;
        write_out(out_metrics, cache.metrics(), "out_metrics")
    })
}

// ── Entry points ──

#[allow(clippy::too_many_arguments)]
fn call_entry(
    entry: EntryPoint,
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    info: Option<ByteSliceView>,
    msg: ByteSliceView,
    backend: Backend,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    guarded(error_msg, || {
        if gas_used.is_null() {
            return Err(VmError::invalid_argument("gas_used pointer is null"));
        }
        if result.is_null() {
            return Err(VmError::invalid_argument("result pointer is null"));
        }
        let cache = to_cache(cache)?;
        let checksum = read_checksum(&checksum)?;
        let env = read_view(&env, "env")?;
        let info = match &info {
            Some(view) => Some(read_view(view, "info")?),
            None => None,
        };
        let msg = read_view(&msg, "msg")?;

        let (outcome, used) =
            cache.call(&checksum, entry, env, info, msg, backend, gas_limit, print_debug);
        write_out(gas_used, used, "gas_used")?;
        let data = outcome?;
        write_out(result, UnmanagedVector::some(data), "result")
    })
}

/// `instantiate` export.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn instantiate(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    info: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_entry(
        EntryPoint::Instantiate,
        cache,
        checksum,
        env,
        Some(info),
        msg,
        Backend { db, api, querier },
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

/// `execute` export.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn execute(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    info: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_entry(
        EntryPoint::Execute,
        cache,
        checksum,
        env,
        Some(info),
        msg,
        Backend { db, api, querier },
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

/// Entry points without message info share one signature.
#[allow(clippy::too_many_arguments)]
fn call_without_info(
    entry: EntryPoint,
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_entry(
        entry,
        cache,
        checksum,
        env,
        None,
        msg,
        Backend { db, api, querier },
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn migrate(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::Migrate,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn query(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::Query,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_channel_open(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcChannelOpen,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_channel_connect(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcChannelConnect,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_channel_close(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcChannelClose,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_packet_receive(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcPacketReceive,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_packet_ack(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcPacketAck,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}

#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn ibc_packet_timeout(
    cache: *mut cache_t,
    checksum: ByteSliceView,
    env: ByteSliceView,
    msg: ByteSliceView,
    db: Db,
    api: Api,
    querier: Querier,
    gas_limit: u64,
    print_debug: bool,
    gas_used: *mut u64,
    result: *mut UnmanagedVector,
    error_msg: *mut UnmanagedVector,
) -> i32 {
    call_without_info(
        EntryPoint::IbcPacketTimeout,
        cache,
        checksum,
        env,
        msg,
        db,
        api,
        querier,
        gas_limit,
        print_debug,
        gas_used,
        result,
        error_msg,
    )
}
