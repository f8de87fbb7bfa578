//! Host function registration via Wasmtime linker.
//!
//! Registers the `env` imports contracts use to reach the host capabilities.
//! Each function:
//! 1. Reads its arguments from guest memory
//! 2. Calls the matching capability table adapter
//! 3. Deducts the gas the host reported from the remaining fuel
//! 4. Writes results into host-allocated guest memory
//!
//! Capability failures and out-of-bounds pointers trap the instance; the
//! trap carries a `VmError` that the runtime recovers. Expected failures of
//! the address and query imports are returned to the contract instead:
//! status `1` with the message in the out slots.

use wasmtime::{Caller, Linker, Memory};

use vmbridge_primitives::{gas::gas_cost_debug, Order};

use crate::backend::{BackendError, GasInfo};
use crate::error::VmError;
use crate::host_impl::InstanceState;
use crate::memory::{self, write_out_slots};
use crate::validation::IMPORT_MODULE;

/// Status returned to the contract on success.
const OK: i32 = 0;
/// Status for "absent" (db_read, db_next) or "user error" (address, query).
const NONE_OR_USER_ERR: i32 = 1;

fn get_memory(caller: &mut Caller<'_, InstanceState>) -> Result<Memory, VmError> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| VmError::Memory("no memory export".into()))
}

fn read_guest(
    caller: &Caller<'_, InstanceState>,
    mem: &Memory,
    ptr: u32,
    len: u32,
) -> Result<Vec<u8>, VmError> {
    memory::read_bytes(mem.data(caller), ptr, len)
}

/// Deduct callback gas from the remaining fuel.
fn charge_gas(caller: &mut Caller<'_, InstanceState>, gas: u64) -> anyhow::Result<()> {
    let remaining = caller.get_fuel()?;
    if gas > remaining {
        caller.set_fuel(0)?;
        return Err(VmError::OutOfGas.into());
    }
    caller.set_fuel(remaining - gas)?;
    Ok(())
}

fn process_gas_info(caller: &mut Caller<'_, InstanceState>, info: GasInfo) -> anyhow::Result<()> {
    charge_gas(caller, info.externally_used)
}

/// Turn a capability failure into a trap. Host-reported out of gas drains
/// the remaining fuel so the call reports the full limit as used.
fn backend_trap(caller: &mut Caller<'_, InstanceState>, err: BackendError) -> anyhow::Error {
    if err == BackendError::OutOfGas {
        if let Err(e) = caller.set_fuel(0) {
            return e;
        }
    }
    VmError::from(err).into()
}

fn write_none(
    caller: &mut Caller<'_, InstanceState>,
    mem: &Memory,
    out_ptr_ptr: u32,
    out_len_ptr: u32,
) -> Result<(), VmError> {
    let data = mem.data_mut(caller);
    memory::write_u32(data, out_ptr_ptr, 0)?;
    memory::write_u32(data, out_len_ptr, 0)?;
    Ok(())
}

/// Register all `env` host functions with the linker.
pub fn register_host_functions(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    register_db_read(linker)?;
    register_db_write(linker)?;
    register_db_remove(linker)?;
    register_db_scan(linker)?;
    register_db_next(linker)?;
    register_addr_humanize(linker)?;
    register_addr_canonicalize(linker)?;
    register_query_chain(linker)?;
    register_debug(linker)?;
    Ok(())
}

// ── Storage ──

fn register_db_read(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_read",
        |mut caller: Caller<'_, InstanceState>,
         key_ptr: u32,
         key_len: u32,
         out_ptr_ptr: u32,
         out_len_ptr: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let key = read_guest(&caller, &mem, key_ptr, key_len)?;

            let (result, gas_info) = caller.data().backend.db.read(&key);
            process_gas_info(&mut caller, gas_info)?;
            let value = result.map_err(|e| backend_trap(&mut caller, e))?;

            match value {
                Some(value) => {
                    write_out_slots(&mem, &mut caller, &value, out_ptr_ptr, out_len_ptr)?;
                    Ok(OK)
                }
                None => {
                    write_none(&mut caller, &mem, out_ptr_ptr, out_len_ptr)?;
                    Ok(NONE_OR_USER_ERR)
                }
            }
        },
    )?;
    Ok(())
}

fn register_db_write(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_write",
        |mut caller: Caller<'_, InstanceState>,
         key_ptr: u32,
         key_len: u32,
         val_ptr: u32,
         val_len: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let key = read_guest(&caller, &mem, key_ptr, key_len)?;
            let value = read_guest(&caller, &mem, val_ptr, val_len)?;

            let (result, gas_info) = caller.data().backend.db.write(&key, &value);
            process_gas_info(&mut caller, gas_info)?;
            result.map_err(|e| backend_trap(&mut caller, e))?;
            Ok(OK)
        },
    )?;
    Ok(())
}

fn register_db_remove(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_remove",
        |mut caller: Caller<'_, InstanceState>, key_ptr: u32, key_len: u32| -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let key = read_guest(&caller, &mem, key_ptr, key_len)?;

            let (result, gas_info) = caller.data().backend.db.remove(&key);
            process_gas_info(&mut caller, gas_info)?;
            result.map_err(|e| backend_trap(&mut caller, e))?;
            Ok(OK)
        },
    )?;
    Ok(())
}

/// `db_scan(start_ptr, start_len, end_ptr, end_len, order) -> iterator id`.
/// A zero pointer is an open bound.
fn register_db_scan(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_scan",
        |mut caller: Caller<'_, InstanceState>,
         start_ptr: u32,
         start_len: u32,
         end_ptr: u32,
         end_len: u32,
         order: i32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let start = match start_ptr {
                0 => None,
                ptr => Some(read_guest(&caller, &mem, ptr, start_len)?),
            };
            let end = match end_ptr {
                0 => None,
                ptr => Some(read_guest(&caller, &mem, ptr, end_len)?),
            };
            let order = Order::try_from(order)
                .map_err(|o| VmError::Runtime(format!("invalid iteration order {}", o)))?;

            let (result, gas_info) =
                caller
                    .data()
                    .backend
                    .db
                    .scan(start.as_deref(), end.as_deref(), order);
            process_gas_info(&mut caller, gas_info)?;
            let iter = result.map_err(|e| backend_trap(&mut caller, e))?;
            Ok(caller.data_mut().store_iterator(iter) as i32)
        },
    )?;
    Ok(())
}

fn register_db_next(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "db_next",
        |mut caller: Caller<'_, InstanceState>,
         iterator_id: u32,
         key_ptr_ptr: u32,
         key_len_ptr: u32,
         val_ptr_ptr: u32,
         val_len_ptr: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;

            let (result, gas_info) = caller.data_mut().next_record(iterator_id);
            process_gas_info(&mut caller, gas_info)?;
            let record = result.map_err(|e| backend_trap(&mut caller, e))?;

            match record {
                Some((key, value)) => {
                    write_out_slots(&mem, &mut caller, &key, key_ptr_ptr, key_len_ptr)?;
                    write_out_slots(&mem, &mut caller, &value, val_ptr_ptr, val_len_ptr)?;
                    Ok(OK)
                }
                None => {
                    write_none(&mut caller, &mem, key_ptr_ptr, key_len_ptr)?;
                    write_none(&mut caller, &mem, val_ptr_ptr, val_len_ptr)?;
                    Ok(NONE_OR_USER_ERR)
                }
            }
        },
    )?;
    Ok(())
}

// ── Address codec ──

fn register_addr_humanize(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "addr_humanize",
        |mut caller: Caller<'_, InstanceState>,
         src_ptr: u32,
         src_len: u32,
         out_ptr_ptr: u32,
         out_len_ptr: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let canonical = read_guest(&caller, &mem, src_ptr, src_len)?;

            let (result, gas_info) = caller.data().backend.api.humanize_address(&canonical);
            process_gas_info(&mut caller, gas_info)?;
            match result {
                Ok(human) => {
                    write_out_slots(&mem, &mut caller, human.as_bytes(), out_ptr_ptr, out_len_ptr)?;
                    Ok(OK)
                }
                Err(BackendError::UserErr { msg }) => {
                    write_out_slots(&mem, &mut caller, msg.as_bytes(), out_ptr_ptr, out_len_ptr)?;
                    Ok(NONE_OR_USER_ERR)
                }
                Err(e) => Err(backend_trap(&mut caller, e)),
            }
        },
    )?;
    Ok(())
}

fn register_addr_canonicalize(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "addr_canonicalize",
        |mut caller: Caller<'_, InstanceState>,
         src_ptr: u32,
         src_len: u32,
         out_ptr_ptr: u32,
         out_len_ptr: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let raw = read_guest(&caller, &mem, src_ptr, src_len)?;
            let human = match String::from_utf8(raw) {
                Ok(human) => human,
                Err(_) => {
                    let msg = b"Input is not valid UTF-8";
                    write_out_slots(&mem, &mut caller, msg, out_ptr_ptr, out_len_ptr)?;
                    return Ok(NONE_OR_USER_ERR);
                }
            };

            let (result, gas_info) = caller.data().backend.api.canonicalize_address(&human);
            process_gas_info(&mut caller, gas_info)?;
            match result {
                Ok(canonical) => {
                    write_out_slots(&mem, &mut caller, &canonical, out_ptr_ptr, out_len_ptr)?;
                    Ok(OK)
                }
                Err(BackendError::UserErr { msg }) => {
                    write_out_slots(&mem, &mut caller, msg.as_bytes(), out_ptr_ptr, out_len_ptr)?;
                    Ok(NONE_OR_USER_ERR)
                }
                Err(e) => Err(backend_trap(&mut caller, e)),
            }
        },
    )?;
    Ok(())
}

// ── Queries ──

fn register_query_chain(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "query_chain",
        |mut caller: Caller<'_, InstanceState>,
         req_ptr: u32,
         req_len: u32,
         out_ptr_ptr: u32,
         out_len_ptr: u32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let request = read_guest(&caller, &mem, req_ptr, req_len)?;
            let gas_limit = caller.get_fuel()?;

            let (result, gas_info) = caller.data().backend.querier.query_raw(&request, gas_limit);
            process_gas_info(&mut caller, gas_info)?;
            match result {
                Ok(response) => {
                    write_out_slots(&mem, &mut caller, &response, out_ptr_ptr, out_len_ptr)?;
                    Ok(OK)
                }
                Err(BackendError::UserErr { msg }) => {
                    write_out_slots(&mem, &mut caller, msg.as_bytes(), out_ptr_ptr, out_len_ptr)?;
                    Ok(NONE_OR_USER_ERR)
                }
                Err(e) => Err(backend_trap(&mut caller, e)),
            }
        },
    )?;
    Ok(())
}

// ── Debug ──

fn register_debug(linker: &mut Linker<InstanceState>) -> Result<(), VmError> {
    linker.func_wrap(
        IMPORT_MODULE,
        "debug",
        |mut caller: Caller<'_, InstanceState>, msg_ptr: u32, msg_len: u32| -> anyhow::Result<()> {
            let mem = get_memory(&mut caller)?;
            let msg = read_guest(&caller, &mem, msg_ptr, msg_len)?;
            charge_gas(&mut caller, gas_cost_debug(msg.len()))?;
            if caller.data().print_debug {
                tracing::debug!(
                    target: "vmbridge::contract",
                    msg = %String::from_utf8_lossy(&msg),
                    "contract debug"
                );
            }
            Ok(())
        },
    )?;
    Ok(())
}
