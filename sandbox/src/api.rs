//! Address codec capability table.

use vmbridge_primitives::{ByteSliceView, UnmanagedVector};

use crate::backend::{missing_callback, status_into_result, BackendError, BackendResult, GasInfo};

/// Opaque host address codec state.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct api_t {
    _private: [u8; 0],
}

/// On failure both slots return a nonzero status, leave `output` none and may
/// write a message to `error_msg_out`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiVtable {
    pub humanize_address: Option<
        extern "C" fn(
            api: *const api_t,
            canonical: ByteSliceView,
            output: *mut UnmanagedVector,
            error_msg_out: *mut UnmanagedVector,
            used_gas: *mut u64,
        ) -> i32,
    >,
    pub canonicalize_address: Option<
        extern "C" fn(
            api: *const api_t,
            human: ByteSliceView,
            output: *mut UnmanagedVector,
            error_msg_out: *mut UnmanagedVector,
            used_gas: *mut u64,
        ) -> i32,
    >,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Api {
    pub state: *const api_t,
    pub vtable: ApiVtable,
}

impl Api {
    pub fn humanize_address(&self, canonical: &[u8]) -> BackendResult<String> {
        let humanize = match self.vtable.humanize_address {
            Some(f) => f,
            None => return (Err(missing_callback("humanize_address")), GasInfo::free()),
        };
        let mut output = UnmanagedVector::default();
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = humanize(
            self.state,
            ByteSliceView::new(canonical),
            &mut output,
            &mut error_msg,
            &mut used_gas,
        );
        let output = output.consume();
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            format!("Failed to humanize canonical address 0x{}", hex::encode(canonical))
        }) {
            return (Err(e), gas_info);
        }
        let result = match output {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|_| BackendError::unknown("humanize_address returned invalid UTF-8")),
            None => Err(BackendError::unknown("humanize_address returned an unset output")),
        };
        (result, gas_info)
    }

    pub fn canonicalize_address(&self, human: &str) -> BackendResult<Vec<u8>> {
        let canonicalize = match self.vtable.canonicalize_address {
            Some(f) => f,
            None => return (Err(missing_callback("canonicalize_address")), GasInfo::free()),
        };
        let mut output = UnmanagedVector::default();
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = canonicalize(
            self.state,
            ByteSliceView::new(human.as_bytes()),
            &mut output,
            &mut error_msg,
            &mut used_gas,
        );
        let output = output.consume();
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            format!("Failed to canonicalize address {}", human)
        }) {
            return (Err(e), gas_info);
        }
        let result = output
            .ok_or_else(|| BackendError::unknown("canonicalize_address returned an unset output"));
        (result, gas_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn humanize_upper(
        _api: *const api_t,
        canonical: ByteSliceView,
        output: *mut UnmanagedVector,
        _error_msg_out: *mut UnmanagedVector,
        used_gas: *mut u64,
    ) -> i32 {
        let input = unsafe { canonical.read() }.unwrap_or_default();
        unsafe {
            *used_gas = 9;
            *output = UnmanagedVector::some(input.to_ascii_uppercase());
        }
        0
    }

    extern "C" fn canonicalize_rejects(
        _api: *const api_t,
        _human: ByteSliceView,
        _output: *mut UnmanagedVector,
        error_msg_out: *mut UnmanagedVector,
        _used_gas: *mut u64,
    ) -> i32 {
        unsafe {
            *error_msg_out = UnmanagedVector::some(b"invalid address".to_vec());
        }
        -5
    }

    fn test_api() -> Api {
        Api {
            state: std::ptr::null(),
            vtable: ApiVtable {
                humanize_address: Some(humanize_upper),
                canonicalize_address: Some(canonicalize_rejects),
            },
        }
    }

    #[test]
    fn test_humanize_ok() {
        let (result, gas) = test_api().humanize_address(b"abc");
        assert_eq!(result.unwrap(), "ABC");
        assert_eq!(gas.externally_used, 9);
    }

    #[test]
    fn test_canonicalize_user_error() {
        let (result, _) = test_api().canonicalize_address("abc");
        assert_eq!(result.unwrap_err(), BackendError::user_err("invalid address"));
    }
}
