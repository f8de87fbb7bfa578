//! Sandbox runtime: Wasmtime engine setup and entry-point execution.
//!
//! Every call gets a fresh `Store` and instance, so calls never share guest
//! state. Gas is Wasmtime fuel: the store starts with `gas_limit` fuel,
//! every instruction burns fuel, and host callbacks deduct the gas the host
//! reports.

use wasmtime::{Config, Engine, Instance, Linker, Memory, Module, Store, Trap};

use crate::backend::Backend;
use crate::config::{CacheConfig, WASM_PAGE_SIZE};
use crate::entry_points::EntryPoint;
use crate::error::VmError;
use crate::host_impl::InstanceState;
use crate::linker::register_host_functions;
use crate::memory::{self, alloc_and_write, HostAllocator, HOST_ALLOC_PAGES};

/// Outcome of an entry-point call plus the gas it used. Gas is reported on
/// success and on failure.
pub type CallResult = (Result<Vec<u8>, VmError>, u64);

/// Per-call inputs besides the module and payloads.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub gas_limit: u64,
    pub memory_limit_bytes: usize,
    pub print_debug: bool,
}

/// Create a Wasmtime engine with deterministic configuration.
pub fn create_engine(config: &CacheConfig) -> Result<Engine, VmError> {
    let mut wasm_config = Config::new();

    // Fuel metering doubles as gas metering
    wasm_config.consume_fuel(true);

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    // Memory limits
    let max_bytes = config.max_memory_pages() * WASM_PAGE_SIZE;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Ok(Engine::new(&wasm_config)?)
}

/// Run `entry` on a fresh instance of `module`.
///
/// `info` must be `Some` exactly for entry points that take it.
pub fn call_entry_point(
    engine: &Engine,
    module: &Module,
    entry: EntryPoint,
    env: &[u8],
    info: Option<&[u8]>,
    msg: &[u8],
    backend: Backend,
    options: CallOptions,
) -> CallResult {
    if entry.takes_info() != info.is_some() {
        return (
            Err(VmError::invalid_argument(format!(
                "entry point '{}' {} message info",
                entry.name(),
                if entry.takes_info() { "requires" } else { "does not take" }
            ))),
            0,
        );
    }

    let state = InstanceState::new(backend, options.memory_limit_bytes, options.print_debug);
    let mut store = Store::new(engine, state);
    store.limiter(|state| &mut state.limits);
    if let Err(e) = store.set_fuel(options.gas_limit) {
        return (Err(e.into()), 0);
    }

    let result = run(&mut store, module, entry, env, info, msg);
    let gas_used = match &result {
        Err(VmError::OutOfGas) => options.gas_limit,
        _ => options
            .gas_limit
            .saturating_sub(store.get_fuel().unwrap_or(0)),
    };
    tracing::debug!(
        entry = entry.name(),
        gas_used,
        ok = result.is_ok(),
        "entry point finished"
    );
    (result, gas_used)
}

fn run(
    store: &mut Store<InstanceState>,
    module: &Module,
    entry: EntryPoint,
    env: &[u8],
    info: Option<&[u8]>,
    msg: &[u8],
) -> Result<Vec<u8>, VmError> {
    let instance = instantiate(store, module)?;

    let wasm_memory = instance
        .get_memory(&mut *store, "memory")
        .ok_or_else(|| VmError::Memory("no memory export".into()))?;
    reserve_host_region(store, &wasm_memory)?;

    let env_ptr = alloc_and_write(&wasm_memory, &mut *store, env)?;
    let msg_ptr = alloc_and_write(&wasm_memory, &mut *store, msg)?;
    // Two u32 out slots: result pointer and result length
    let out_ptr_ptr = alloc_and_write(&wasm_memory, &mut *store, &[0u8; 8])?;
    let out_len_ptr = out_ptr_ptr + 4;

    let env_len = env.len() as u32;
    let msg_len = msg.len() as u32;

    let call = match info {
        Some(info) => {
            let info_ptr = alloc_and_write(&wasm_memory, &mut *store, info)?;
            let func = instance
                .get_typed_func::<(u32, u32, u32, u32, u32, u32, u32, u32), i32>(
                    &mut *store,
                    entry.name(),
                )
                .map_err(|e| missing_export(entry, e))?;
            func.call(
                &mut *store,
                (
                    env_ptr,
                    env_len,
                    info_ptr,
                    info.len() as u32,
                    msg_ptr,
                    msg_len,
                    out_ptr_ptr,
                    out_len_ptr,
                ),
            )
        }
        None => {
            let func = instance
                .get_typed_func::<(u32, u32, u32, u32, u32, u32), i32>(&mut *store, entry.name())
                .map_err(|e| missing_export(entry, e))?;
            func.call(
                &mut *store,
                (env_ptr, env_len, msg_ptr, msg_len, out_ptr_ptr, out_len_ptr),
            )
        }
    };
    let code = call.map_err(handle_trap)?;

    let output = {
        let data = wasm_memory.data(&*store);
        let ptr = memory::read_u32(data, out_ptr_ptr)?;
        let len = memory::read_u32(data, out_len_ptr)?;
        memory::read_bytes(data, ptr, len)?
    };

    if code == 0 {
        Ok(output)
    } else {
        Err(VmError::Contract(String::from_utf8_lossy(&output).into_owned()))
    }
}

fn instantiate(store: &mut Store<InstanceState>, module: &Module) -> Result<Instance, VmError> {
    let mut linker = Linker::new(store.engine());
    register_host_functions(&mut linker)?;
    linker.instantiate(&mut *store, module).map_err(|e| {
        if is_out_of_fuel(&e) {
            VmError::OutOfGas
        } else {
            VmError::Instantiation(format!("{:#}", e))
        }
    })
}

/// Grow memory past the guest's data and hand the new pages to the host allocator.
fn reserve_host_region(store: &mut Store<InstanceState>, wasm_memory: &Memory) -> Result<(), VmError> {
    let current_pages = wasm_memory.size(&*store);
    wasm_memory
        .grow(&mut *store, HOST_ALLOC_PAGES)
        .map_err(|e| VmError::Memory(format!("initial grow: {}", e)))?;

    let base = (current_pages * WASM_PAGE_SIZE) as usize;
    let capacity = (HOST_ALLOC_PAGES * WASM_PAGE_SIZE) as usize;
    store.data_mut().host_alloc = HostAllocator::new(base, capacity);
    Ok(())
}

fn missing_export(entry: EntryPoint, err: anyhow::Error) -> VmError {
    VmError::Runtime(format!("entry point '{}' unavailable: {}", entry.name(), err))
}

fn is_out_of_fuel(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel))
}

/// Convert a guest call failure to `VmError`.
///
/// Fuel exhaustion → `VmError::OutOfGas`
/// Errors raised by host functions are recovered as-is
/// Other traps → `VmError::Runtime`
fn handle_trap(err: anyhow::Error) -> VmError {
    if is_out_of_fuel(&err) {
        return VmError::OutOfGas;
    }
    match err.downcast::<VmError>() {
        Ok(vm_err) => vm_err,
        Err(other) => VmError::Runtime(format!("{:#}", other)),
    }
}
