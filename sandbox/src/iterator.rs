//! Iterator capability table.
//!
//! An iterator is opened by `scan_db`, which fills in a [`DbIter`]. The
//! cursor itself lives in the host's invocation frame and is addressed by
//! [`iterator_t`]; the engine only keeps the handle.

use vmbridge_primitives::{Record, UnmanagedVector};

use crate::backend::{missing_callback, status_into_result, BackendError, BackendResult, GasInfo};
use crate::db::gas_meter_t;

/// Host-side address of a cursor: the invocation frame and its slot.
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct iterator_t {
    pub frame_id: u64,
    pub iterator_index: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IteratorVtable {
    /// Advances the cursor. At the end both outputs stay none.
    pub next_db: Option<
        extern "C" fn(
            iterator: iterator_t,
            gas_meter: *mut gas_meter_t,
            used_gas: *mut u64,
            key_out: *mut UnmanagedVector,
            value_out: *mut UnmanagedVector,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DbIter {
    pub gas_meter: *mut gas_meter_t,
    pub state: iterator_t,
    pub vtable: IteratorVtable,
}

impl Default for DbIter {
    fn default() -> Self {
        Self {
            gas_meter: std::ptr::null_mut(),
            state: iterator_t::default(),
            vtable: IteratorVtable::default(),
        }
    }
}

impl DbIter {
    pub fn next(&mut self) -> BackendResult<Option<Record>> {
        let next_db = match self.vtable.next_db {
            Some(f) => f,
            None => return (Err(missing_callback("next_db")), GasInfo::free()),
        };
        let mut key = UnmanagedVector::default();
        let mut value = UnmanagedVector::default();
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = next_db(
            self.state,
            self.gas_meter,
            &mut used_gas,
            &mut key,
            &mut value,
            &mut error_msg,
        );
        let key = key.consume();
        let value = value.consume();
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            "Failed to fetch next item from iterator".to_string()
        }) {
            return (Err(e), gas_info);
        }
        let record = match (key, value) {
            (Some(k), Some(v)) => Some((k, v)),
            (None, _) => None,
            (Some(_), None) => {
                return (
                    Err(BackendError::unknown("Iterator returned a key without a value")),
                    gas_info,
                )
            }
        };
        (Ok(record), gas_info)
    }
}
