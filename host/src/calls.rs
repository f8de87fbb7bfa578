//! Safe wrappers over the engine exports.
//!
//! Each entry-point wrapper:
//! 1. Starts an invocation frame
//! 2. Builds callback tables over the caller's capabilities and gas meter
//! 3. Calls the engine export with views over the inputs
//! 4. Ends the frame (also on error and unwinding)
//! 5. Turns the status, result and message into `(Result, gas_used)`

use std::ptr::NonNull;

use vmbridge_hostapi::{AddressCodec, CacheOptions, HostGasMeter, Querier, Storage};
use vmbridge_primitives::{
    parse_capabilities, AnalysisReport, ByteSliceView, Checksum, UnmanagedVector,
};
use vmbridge_sandbox::{ffi, cache_t, Api, Db, Metrics, Querier as RawQuerier, RawAnalysisReport};

use crate::callbacks::{ApiState, CallbackTable, DbState, QuerierState};
use crate::error::{error_with_message, VmError};
use crate::frame::FrameGuard;

/// Result of an entry-point call and the gas it used.
pub type CallOutput = (Result<Vec<u8>, VmError>, u64);

/// The capabilities a contract may use during one call.
pub struct Capabilities<'a> {
    pub store: &'a mut dyn Storage,
    pub api: &'a dyn AddressCodec,
    pub querier: &'a dyn Querier,
}

/// Owned handle to an engine module cache. Released on drop.
#[derive(Debug)]
pub struct Cache {
    ptr: NonNull<cache_t>,
}

// SAFETY: the engine cache synchronizes internally; release happens once, on drop.
unsafe impl Send for Cache {}
unsafe impl Sync for Cache {}

impl Cache {
    fn as_ptr(&self) -> *mut cache_t {
        self.ptr.as_ptr()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        // SAFETY: the pointer came from init_cache and is released exactly once
        unsafe { ffi::release_cache(self.ptr.as_ptr()) };
    }
}

/// Turn an export's status and message into a result.
fn check(code: i32, error_msg: UnmanagedVector) -> Result<(), VmError> {
    if code == 0 {
        let _ = error_msg.consume();
        Ok(())
    } else {
        Err(error_with_message(code, error_msg))
    }
}

// ── Module lifecycle ──

pub fn init_cache(options: &CacheOptions) -> Result<Cache, VmError> {
    options
        .validate()
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;
    let data_dir = options
        .data_dir
        .to_str()
        .ok_or_else(|| VmError::invalid_argument("data dir is not UTF-8"))?;
    let capabilities = options.capabilities_wire();

    let mut ptr: *mut cache_t = std::ptr::null_mut();
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::init_cache(
        ByteSliceView::new(data_dir.as_bytes()),
        ByteSliceView::new(capabilities.as_bytes()),
        options.memory_cache_size_mib,
        options.instance_memory_limit_mib,
        &mut ptr,
        &mut error_msg,
    );
    check(code, error_msg)?;
    let ptr = NonNull::new(ptr)
        .ok_or_else(|| VmError::engine_failure("engine returned a null cache"))?;
    Ok(Cache { ptr })
}

/// Release a cache. Equivalent to dropping it.
pub fn release_cache(cache: Cache) {
    drop(cache);
}

/// Validate and store wasm code, returning its checksum.
pub fn store_code(cache: &Cache, wasm: &[u8]) -> Result<Checksum, VmError> {
    let mut checksum = UnmanagedVector::none();
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::save_wasm(
        cache.as_ptr(),
        ByteSliceView::new(wasm),
        &mut checksum,
        &mut error_msg,
    );
    let checksum = checksum.consume();
    check(code, error_msg)?;
    let bytes = checksum.ok_or_else(|| VmError::engine_failure("engine returned no checksum"))?;
    Checksum::try_from(bytes.as_slice()).map_err(|e| VmError::engine_failure(e.to_string()))
}

/// Return the wasm code stored under `checksum`.
pub fn get_code(cache: &Cache, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
    let mut wasm = UnmanagedVector::none();
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::load_wasm(
        cache.as_ptr(),
        ByteSliceView::new(checksum.as_slice()),
        &mut wasm,
        &mut error_msg,
    );
    let wasm = wasm.consume();
    check(code, error_msg)?;
    wasm.ok_or_else(|| VmError::engine_failure("engine returned no code"))
}

pub fn pin(cache: &Cache, checksum: &Checksum) -> Result<(), VmError> {
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::pin(
        cache.as_ptr(),
        ByteSliceView::new(checksum.as_slice()),
        &mut error_msg,
    );
    check(code, error_msg)
}

pub fn unpin(cache: &Cache, checksum: &Checksum) -> Result<(), VmError> {
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::unpin(
        cache.as_ptr(),
        ByteSliceView::new(checksum.as_slice()),
        &mut error_msg,
    );
    check(code, error_msg)
}

pub fn analyze_code(cache: &Cache, checksum: &Checksum) -> Result<AnalysisReport, VmError> {
    let mut report = RawAnalysisReport {
        has_ibc_entry_points: false,
        required_capabilities: UnmanagedVector::none(),
    };
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::analyze_code(
        cache.as_ptr(),
        ByteSliceView::new(checksum.as_slice()),
        &mut report,
        &mut error_msg,
    );
    let capabilities = report.required_capabilities.consume().unwrap_or_default();
    check(code, error_msg)?;
    Ok(AnalysisReport {
        has_ibc_entry_points: report.has_ibc_entry_points,
        required_capabilities: parse_capabilities(&String::from_utf8_lossy(&capabilities)),
    })
}

pub fn get_metrics(cache: &Cache) -> Result<Metrics, VmError> {
    let mut metrics = Metrics::default();
    let mut error_msg = UnmanagedVector::none();
    let code = ffi::get_metrics(cache.as_ptr(), &mut metrics, &mut error_msg);
    check(code, error_msg)?;
    Ok(metrics)
}

// ── Entry points ──

type ExportWithInfo = extern "C" fn(
    *mut cache_t,
    ByteSliceView,
    ByteSliceView,
    ByteSliceView,
    ByteSliceView,
    Db,
    Api,
    RawQuerier,
    u64,
    bool,
    *mut u64,
    *mut UnmanagedVector,
    *mut UnmanagedVector,
) -> i32;

type Export = extern "C" fn(
    *mut cache_t,
    ByteSliceView,
    ByteSliceView,
    ByteSliceView,
    Db,
    Api,
    RawQuerier,
    u64,
    bool,
    *mut u64,
    *mut UnmanagedVector,
    *mut UnmanagedVector,
) -> i32;

#[derive(Clone, Copy)]
enum Target {
    WithInfo(ExportWithInfo, &'static str),
    Plain(Export, &'static str),
}

impl Target {
    fn name(self) -> &'static str {
        match self {
            Target::WithInfo(_, name) | Target::Plain(_, name) => name,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn call_engine(
    target: Target,
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    info: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    let frame = FrameGuard::start();
    let gas_meter: *mut HostGasMeter = gas_meter;

    let mut db_table = CallbackTable::new(DbState {
        store: caps.store,
        frame_id: frame.id(),
    });
    let mut api_table = CallbackTable::new(ApiState {
        api: caps.api,
        gas_meter,
    });
    let mut querier_table = CallbackTable::new(QuerierState {
        querier: caps.querier,
        gas_meter,
    });
    let db = db_table.build_db(gas_meter);
    let api = api_table.build_api();
    let querier = querier_table.build_querier();

    let mut gas_used = 0_u64;
    let mut result = UnmanagedVector::none();
    let mut error_msg = UnmanagedVector::none();
    let code = match target {
        Target::WithInfo(export, _) => export(
            cache.as_ptr(),
            ByteSliceView::new(checksum.as_slice()),
            ByteSliceView::new(env),
            ByteSliceView::new(info),
            ByteSliceView::new(msg),
            db,
            api,
            querier,
            gas_limit,
            print_debug,
            &mut gas_used,
            &mut result,
            &mut error_msg,
        ),
        Target::Plain(export, _) => export(
            cache.as_ptr(),
            ByteSliceView::new(checksum.as_slice()),
            ByteSliceView::new(env),
            ByteSliceView::new(msg),
            db,
            api,
            querier,
            gas_limit,
            print_debug,
            &mut gas_used,
            &mut result,
            &mut error_msg,
        ),
    };
    drop(frame);

    let data = result.consume();
    let outcome = check(code, error_msg).map(|()| data.unwrap_or_default());
    tracing::debug!(
        entry = target.name(),
        checksum = %checksum,
        gas_used,
        ok = outcome.is_ok(),
        "contract call finished"
    );
    (outcome, gas_used)
}

#[allow(clippy::too_many_arguments)]
pub fn instantiate(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    info: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    let target = Target::WithInfo(ffi::instantiate, "instantiate");
    call_engine(target, cache, checksum, env, info, msg, gas_meter, caps, gas_limit, print_debug)
}

#[allow(clippy::too_many_arguments)]
pub fn execute(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    info: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    let target = Target::WithInfo(ffi::execute, "execute");
    call_engine(target, cache, checksum, env, info, msg, gas_meter, caps, gas_limit, print_debug)
}

#[allow(clippy::too_many_arguments)]
fn call_plain(
    export: Export,
    name: &'static str,
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_engine(
        Target::Plain(export, name),
        cache,
        checksum,
        env,
        &[],
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn migrate(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(ffi::migrate, "migrate", cache, checksum, env, msg, gas_meter, caps, gas_limit, print_debug)
}

#[allow(clippy::too_many_arguments)]
pub fn query(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(ffi::query, "query", cache, checksum, env, msg, gas_meter, caps, gas_limit, print_debug)
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_channel_open(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_channel_open,
        "ibc_channel_open",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_channel_connect(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_channel_connect,
        "ibc_channel_connect",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_channel_close(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_channel_close,
        "ibc_channel_close",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_packet_receive(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_packet_receive,
        "ibc_packet_receive",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_packet_ack(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_packet_ack,
        "ibc_packet_ack",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn ibc_packet_timeout(
    cache: &Cache,
    checksum: &Checksum,
    env: &[u8],
    msg: &[u8],
    gas_meter: &mut HostGasMeter,
    caps: Capabilities<'_>,
    gas_limit: u64,
    print_debug: bool,
) -> CallOutput {
    call_plain(
        ffi::ibc_packet_timeout,
        "ibc_packet_timeout",
        cache,
        checksum,
        env,
        msg,
        gas_meter,
        caps,
        gas_limit,
        print_debug,
    )
}
