//! Host callback tables handed to the engine.
//!
//! Each capability (store, iterator, address codec, querier) is exposed as a
//! vtable of `extern "C"` functions plus an opaque pointer to its state. The
//! state lives in a [`CallbackTable`] that borrows the caller's capabilities
//! for exactly one entry-point call.
//!
//! Every callback:
//! 1. Rejects null pointers with `BadArgument`
//! 2. Runs the capability inside `catch_unwind`
//! 3. Charges the call's [`HostGasMeter`] and reports the same amount as `used_gas`
//! 4. Returns a [`CallbackStatus`] code, writing a message for user and internal errors

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use vmbridge_hostapi::{AddressCodec, HostError, HostGasMeter, Querier, Storage};
use vmbridge_primitives::gas::{
    gas_cost_canonicalize, gas_cost_humanize, gas_cost_next, gas_cost_query, gas_cost_read,
    gas_cost_remove, gas_cost_scan, gas_cost_write,
};
use vmbridge_primitives::{
    ByteSliceView, CallbackStatus, Order, UnmanagedVector, MAX_KEY_LEN, MAX_VALUE_LEN,
};
use vmbridge_sandbox::{
    api_t, db_t, gas_meter_t, iterator_t, querier_t, Api, ApiVtable, Db, DbIter, DbVtable,
    IteratorVtable, Querier as RawQuerier, QuerierVtable,
};

use crate::frame;

/// Store state: the caller's storage and the frame its iterators go to.
pub struct DbState<'a> {
    pub store: &'a mut dyn Storage,
    pub frame_id: u64,
}

pub struct ApiState<'a> {
    pub api: &'a dyn AddressCodec,
    pub gas_meter: *mut HostGasMeter,
}

pub struct QuerierState<'a> {
    pub querier: &'a dyn Querier,
    pub gas_meter: *mut HostGasMeter,
}

/// Callback state kept at a fixed heap address for the lifetime `'a` of the
/// borrowed capability.
///
/// Tables built from it hold raw pointers into the state, so they must not
/// be used after the `CallbackTable` is dropped.
pub struct CallbackTable<'a, T> {
    state: Box<T>,
    _borrow: PhantomData<&'a ()>,
}

impl<'a, T> CallbackTable<'a, T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Box::new(state),
            _borrow: PhantomData,
        }
    }

    fn state_ptr(&mut self) -> *mut T {
        &mut *self.state
    }
}

impl<'a> CallbackTable<'a, DbState<'a>> {
    /// Store table charging `gas_meter`.
    pub fn build_db(&mut self, gas_meter: *mut HostGasMeter) -> Db {
        Db {
            gas_meter: gas_meter as *mut gas_meter_t,
            state: self.state_ptr() as *mut db_t,
            vtable: DbVtable {
                read_db: Some(cget),
                write_db: Some(cset),
                remove_db: Some(cdelete),
                scan_db: Some(cscan),
            },
        }
    }
}

impl<'a> CallbackTable<'a, ApiState<'a>> {
    pub fn build_api(&mut self) -> Api {
        Api {
            state: self.state_ptr() as *const api_t,
            vtable: ApiVtable {
                humanize_address: Some(chumanize),
                canonicalize_address: Some(ccanonicalize),
            },
        }
    }
}

impl<'a> CallbackTable<'a, QuerierState<'a>> {
    pub fn build_querier(&mut self) -> RawQuerier {
        RawQuerier {
            state: self.state_ptr() as *const querier_t,
            vtable: QuerierVtable {
                query_external: Some(cquery),
            },
        }
    }
}

// ── Plumbing ──

/// Run a callback body with panics contained and errors turned into codes.
fn guarded<F>(name: &'static str, error_msg_out: *mut UnmanagedVector, f: F) -> i32
where
    F: FnOnce() -> Result<(), HostError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => CallbackStatus::Ok.as_i32(),
        Ok(Err(err)) => {
            if let HostError::Internal(msg) = &err {
                tracing::warn!(callback = name, error = %msg, "host capability failed");
            }
            if let Some(msg) = err.message() {
                // SAFETY: checked non-null by every callback before this point
                unsafe { *error_msg_out = UnmanagedVector::some(msg) };
            }
            err.to_status()
        }
        Err(_) => {
            tracing::warn!(callback = name, "host callback panicked");
            // SAFETY: as above
            unsafe {
                *error_msg_out = UnmanagedVector::some(format!("panic in host callback {}", name))
            };
            CallbackStatus::Panic.as_i32()
        }
    }
}

fn bad_argument() -> i32 {
    CallbackStatus::BadArgument.as_i32()
}

/// Charge `cost` to the meter and report it to the engine.
fn charge(gas_meter: *mut HostGasMeter, used_gas: *mut u64, cost: u64) -> Result<(), HostError> {
    // SAFETY: both pointers were checked non-null and outlive the call
    let meter = unsafe { &mut *gas_meter };
    meter.charge(cost)?;
    unsafe { *used_gas = cost };
    Ok(())
}

fn read_view<'v>(view: &'v ByteSliceView) -> Result<&'v [u8], HostError> {
    // SAFETY: the engine keeps viewed bytes alive for the callback
    unsafe { view.read() }.ok_or_else(HostError::bad_argument)
}

fn check_key(key: &[u8]) -> Result<(), HostError> {
    if key.len() > MAX_KEY_LEN {
        return Err(HostError::user(format!(
            "key of {} bytes exceeds the limit of {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    Ok(())
}

// ── Store ──

extern "C" fn cget(
    db: *mut db_t,
    gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    key: ByteSliceView,
    value_out: *mut UnmanagedVector,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if db.is_null() || gas_meter.is_null() || used_gas.is_null() || value_out.is_null()
        || error_msg_out.is_null()
    {
        return bad_argument();
    }
    guarded("read_db", error_msg_out, || {
        // SAFETY: `db` points at the DbState of the running call
        let state = unsafe { &mut *(db as *mut DbState<'_>) };
        let key = read_view(&key)?;
        let value = state.store.get(key)?;
        let cost = gas_cost_read(key.len(), value.as_ref().map_or(0, Vec::len));
        charge(gas_meter as *mut HostGasMeter, used_gas, cost)?;
        unsafe { *value_out = UnmanagedVector::new(value) };
        Ok(())
    })
}

extern "C" fn cset(
    db: *mut db_t,
    gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    key: ByteSliceView,
    value: ByteSliceView,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if db.is_null() || gas_meter.is_null() || used_gas.is_null() || error_msg_out.is_null() {
        return bad_argument();
    }
    guarded("write_db", error_msg_out, || {
        let state = unsafe { &mut *(db as *mut DbState<'_>) };
        let key = read_view(&key)?;
        let value = read_view(&value)?;
        check_key(key)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(HostError::user(format!(
                "value of {} bytes exceeds the limit of {}",
                value.len(),
                MAX_VALUE_LEN
            )));
        }
        charge(
            gas_meter as *mut HostGasMeter,
            used_gas,
            gas_cost_write(key.len(), value.len()),
        )?;
        state.store.set(key, value)
    })
}

extern "C" fn cdelete(
    db: *mut db_t,
    gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    key: ByteSliceView,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if db.is_null() || gas_meter.is_null() || used_gas.is_null() || error_msg_out.is_null() {
        return bad_argument();
    }
    guarded("remove_db", error_msg_out, || {
        let state = unsafe { &mut *(db as *mut DbState<'_>) };
        let key = read_view(&key)?;
        check_key(key)?;
        charge(gas_meter as *mut HostGasMeter, used_gas, gas_cost_remove(key.len()))?;
        state.store.remove(key)
    })
}

#[allow(clippy::too_many_arguments)]
extern "C" fn cscan(
    db: *mut db_t,
    gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    start: ByteSliceView,
    end: ByteSliceView,
    order: i32,
    iterator_out: *mut DbIter,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if db.is_null() || gas_meter.is_null() || used_gas.is_null() || iterator_out.is_null()
        || error_msg_out.is_null()
    {
        return bad_argument();
    }
    guarded("scan_db", error_msg_out, || {
        let state = unsafe { &mut *(db as *mut DbState<'_>) };
        // SAFETY: nil views are open bounds, others stay valid for the callback
        let start = unsafe { start.read() };
        let end = unsafe { end.read() };
        let order = Order::try_from(order).map_err(|_| HostError::bad_argument())?;

        charge(
            gas_meter as *mut HostGasMeter,
            used_gas,
            gas_cost_scan(start.map_or(0, <[u8]>::len), end.map_or(0, <[u8]>::len)),
        )?;
        let iter = state.store.range(start, end, order)?;
        let iterator_index = frame::store_iterator(state.frame_id, iter)?;

        let handle = DbIter {
            gas_meter,
            state: iterator_t {
                frame_id: state.frame_id,
                iterator_index,
            },
            vtable: IteratorVtable {
                next_db: Some(cnext),
            },
        };
        unsafe { *iterator_out = handle };
        Ok(())
    })
}

// ── Iterator ──

extern "C" fn cnext(
    iterator: iterator_t,
    gas_meter: *mut gas_meter_t,
    used_gas: *mut u64,
    key_out: *mut UnmanagedVector,
    value_out: *mut UnmanagedVector,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if gas_meter.is_null() || used_gas.is_null() || key_out.is_null() || value_out.is_null()
        || error_msg_out.is_null()
    {
        return bad_argument();
    }
    guarded("next_db", error_msg_out, || {
        let record = frame::next_record(iterator.frame_id, iterator.iterator_index)?;
        let record_len = record.as_ref().map_or(0, |(k, v)| k.len() + v.len());
        charge(gas_meter as *mut HostGasMeter, used_gas, gas_cost_next(record_len))?;
        if let Some((key, value)) = record {
            unsafe {
                *key_out = UnmanagedVector::some(key);
                *value_out = UnmanagedVector::some(value);
            }
        }
        Ok(())
    })
}

// ── Address codec ──

extern "C" fn chumanize(
    api: *const api_t,
    canonical: ByteSliceView,
    output: *mut UnmanagedVector,
    error_msg_out: *mut UnmanagedVector,
    used_gas: *mut u64,
) -> i32 {
    if api.is_null() || output.is_null() || error_msg_out.is_null() || used_gas.is_null() {
        return bad_argument();
    }
    guarded("humanize_address", error_msg_out, || {
        // SAFETY: `api` points at the ApiState of the running call
        let state = unsafe { &*(api as *const ApiState<'_>) };
        let canonical = read_view(&canonical)?;
        charge(state.gas_meter, used_gas, gas_cost_humanize(canonical.len()))?;
        let human = state.api.humanize(canonical)?;
        unsafe { *output = UnmanagedVector::some(human) };
        Ok(())
    })
}

extern "C" fn ccanonicalize(
    api: *const api_t,
    human: ByteSliceView,
    output: *mut UnmanagedVector,
    error_msg_out: *mut UnmanagedVector,
    used_gas: *mut u64,
) -> i32 {
    if api.is_null() || output.is_null() || error_msg_out.is_null() || used_gas.is_null() {
        return bad_argument();
    }
    guarded("canonicalize_address", error_msg_out, || {
        let state = unsafe { &*(api as *const ApiState<'_>) };
        let human = read_view(&human)?;
        charge(state.gas_meter, used_gas, gas_cost_canonicalize(human.len()))?;
        let human = std::str::from_utf8(human)
            .map_err(|_| HostError::user("Input is not valid UTF-8"))?;
        let canonical = state.api.canonicalize(human)?;
        unsafe { *output = UnmanagedVector::some(canonical) };
        Ok(())
    })
}

// ── Querier ──

extern "C" fn cquery(
    querier: *const querier_t,
    gas_limit: u64,
    used_gas: *mut u64,
    request: ByteSliceView,
    result_out: *mut UnmanagedVector,
    error_msg_out: *mut UnmanagedVector,
) -> i32 {
    if querier.is_null() || used_gas.is_null() || result_out.is_null() || error_msg_out.is_null()
    {
        return bad_argument();
    }
    guarded("query_external", error_msg_out, || {
        // SAFETY: `querier` points at the QuerierState of the running call
        let state = unsafe { &*(querier as *const QuerierState<'_>) };
        let request = read_view(&request)?;
        charge(state.gas_meter, used_gas, gas_cost_query(request.len()))?;
        let response = state.querier.query_raw(request, gas_limit)?;
        unsafe { *result_out = UnmanagedVector::some(response) };
        Ok(())
    })
}
