//! Cross-contract query capability table.

use vmbridge_primitives::{ByteSliceView, UnmanagedVector};

use crate::backend::{missing_callback, status_into_result, BackendError, BackendResult, GasInfo};

/// Opaque host querier state.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct querier_t {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerierVtable {
    pub query_external: Option<
        extern "C" fn(
            querier: *const querier_t,
            gas_limit: u64,
            used_gas: *mut u64,
            request: ByteSliceView,
            result_out: *mut UnmanagedVector,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Querier {
    pub state: *const querier_t,
    pub vtable: QuerierVtable,
}

impl Querier {
    /// Forward `request` to the host unchanged, allowing it `gas_limit` gas.
    pub fn query_raw(&self, request: &[u8], gas_limit: u64) -> BackendResult<Vec<u8>> {
        let query_external = match self.vtable.query_external {
            Some(f) => f,
            None => return (Err(missing_callback("query_external")), GasInfo::free()),
        };
        let mut output = UnmanagedVector::default();
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = query_external(
            self.state,
            gas_limit,
            &mut used_gas,
            ByteSliceView::new(request),
            &mut output,
            &mut error_msg,
        );
        let output = output.consume();
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            "Failed to query another contract".to_string()
        }) {
            return (Err(e), gas_info);
        }
        let result =
            output.ok_or_else(|| BackendError::unknown("query_external returned an unset output"));
        (result, gas_info)
    }
}
