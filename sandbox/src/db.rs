//! Store capability table.

use vmbridge_primitives::{ByteSliceView, Order, UnmanagedVector};

use crate::backend::{missing_callback, status_into_result, BackendResult, GasInfo};
use crate::iterator::DbIter;

/// Opaque host store state.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct db_t {
    _private: [u8; 0],
}

/// Opaque host gas meter.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct gas_meter_t {
    _private: [u8; 0],
}

/// Store callbacks. Every slot receives the gas meter, reports the gas it
/// used through `used_gas` and may write a message to the last argument.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DbVtable {
    /// Writes the value to `value_out`; leaves it none when the key is missing.
    pub read_db: Option<
        extern "C" fn(
            db: *mut db_t,
            gas_meter: *mut gas_meter_t,
            used_gas: *mut u64,
            key: ByteSliceView,
            value_out: *mut UnmanagedVector,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
    pub write_db: Option<
        extern "C" fn(
            db: *mut db_t,
            gas_meter: *mut gas_meter_t,
            used_gas: *mut u64,
            key: ByteSliceView,
            value: ByteSliceView,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
    pub remove_db: Option<
        extern "C" fn(
            db: *mut db_t,
            gas_meter: *mut gas_meter_t,
            used_gas: *mut u64,
            key: ByteSliceView,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
    /// Opens an iterator over `[start, end)`; nil views are open bounds.
    pub scan_db: Option<
        extern "C" fn(
            db: *mut db_t,
            gas_meter: *mut gas_meter_t,
            used_gas: *mut u64,
            start: ByteSliceView,
            end: ByteSliceView,
            order: i32,
            iterator_out: *mut DbIter,
            error_msg_out: *mut UnmanagedVector,
        ) -> i32,
    >,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Db {
    pub gas_meter: *mut gas_meter_t,
    pub state: *mut db_t,
    pub vtable: DbVtable,
}

impl Db {
    pub fn read(&self, key: &[u8]) -> BackendResult<Option<Vec<u8>>> {
        let read_db = match self.vtable.read_db {
            Some(f) => f,
            None => return (Err(missing_callback("read_db")), GasInfo::free()),
        };
        let mut output = UnmanagedVector::default();
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = read_db(
            self.state,
            self.gas_meter,
            &mut used_gas,
            ByteSliceView::new(key),
            &mut output,
            &mut error_msg,
        );
        // Consume unconditionally so the allocation is released on every path.
        let value = output.consume();
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            format!("Failed to read key {}", hex_preview(key))
        }) {
            return (Err(e), gas_info);
        }
        (Ok(value), gas_info)
    }

    pub fn write(&self, key: &[u8], value: &[u8]) -> BackendResult<()> {
        let write_db = match self.vtable.write_db {
            Some(f) => f,
            None => return (Err(missing_callback("write_db")), GasInfo::free()),
        };
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = write_db(
            self.state,
            self.gas_meter,
            &mut used_gas,
            ByteSliceView::new(key),
            ByteSliceView::new(value),
            &mut error_msg,
        );
        let gas_info = GasInfo::with_externally_used(used_gas);
        let result = status_into_result(code, error_msg, || {
            format!("Failed to write key {}", hex_preview(key))
        });
        (result, gas_info)
    }

    pub fn remove(&self, key: &[u8]) -> BackendResult<()> {
        let remove_db = match self.vtable.remove_db {
            Some(f) => f,
            None => return (Err(missing_callback("remove_db")), GasInfo::free()),
        };
        let mut error_msg = UnmanagedVector::default();
        let mut used_gas = 0_u64;
        let code = remove_db(
            self.state,
            self.gas_meter,
            &mut used_gas,
            ByteSliceView::new(key),
            &mut error_msg,
        );
        let gas_info = GasInfo::with_externally_used(used_gas);
        let result = status_into_result(code, error_msg, || {
            format!("Failed to remove key {}", hex_preview(key))
        });
        (result, gas_info)
    }

    pub fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> BackendResult<DbIter> {
        let scan_db = match self.vtable.scan_db {
            Some(f) => f,
            None => return (Err(missing_callback("scan_db")), GasInfo::free()),
        };
        let mut error_msg = UnmanagedVector::default();
        let mut iter = DbIter::default();
        let mut used_gas = 0_u64;
        let code = scan_db(
            self.state,
            self.gas_meter,
            &mut used_gas,
            ByteSliceView::from_option(start),
            ByteSliceView::from_option(end),
            order as i32,
            &mut iter,
            &mut error_msg,
        );
        let gas_info = GasInfo::with_externally_used(used_gas);
        if let Err(e) = status_into_result(code, error_msg, || {
            "Failed to open an iterator".to_string()
        }) {
            return (Err(e), gas_info);
        }
        (Ok(iter), gas_info)
    }
}

fn hex_preview(key: &[u8]) -> String {
    const MAX: usize = 32;
    if key.len() > MAX {
        format!("0x{}...", hex::encode(&key[..MAX]))
    } else {
        format!("0x{}", hex::encode(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn read_present(
        _db: *mut db_t,
        _gas_meter: *mut gas_meter_t,
        used_gas: *mut u64,
        key: ByteSliceView,
        value_out: *mut UnmanagedVector,
        _error_msg_out: *mut UnmanagedVector,
    ) -> i32 {
        let key = unsafe { key.read() }.unwrap_or_default();
        unsafe {
            *used_gas = 11;
            if key == b"empty" {
                *value_out = UnmanagedVector::some(Vec::new());
            } else if key == b"some" {
                *value_out = UnmanagedVector::some(b"value".to_vec());
            }
        }
        0
    }

    extern "C" fn write_fails(
        _db: *mut db_t,
        _gas_meter: *mut gas_meter_t,
        used_gas: *mut u64,
        _key: ByteSliceView,
        _value: ByteSliceView,
        error_msg_out: *mut UnmanagedVector,
    ) -> i32 {
        unsafe {
            *used_gas = 5;
            *error_msg_out = UnmanagedVector::some(b"disk full".to_vec());
        }
        -4
    }

    fn test_db() -> Db {
        Db {
            gas_meter: std::ptr::null_mut(),
            state: std::ptr::null_mut(),
            vtable: DbVtable {
                read_db: Some(read_present),
                write_db: Some(write_fails),
                ..DbVtable::default()
            },
        }
    }

    #[test]
    fn test_read_distinguishes_absent_and_empty() {
        let db = test_db();
        let (missing, gas) = db.read(b"missing");
        assert_eq!(missing.unwrap(), None);
        assert_eq!(gas.externally_used, 11);

        let (empty, _) = db.read(b"empty");
        assert_eq!(empty.unwrap(), Some(Vec::new()));

        let (some, _) = db.read(b"some");
        assert_eq!(some.unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_write_error_keeps_gas() {
        let db = test_db();
        let (result, gas) = db.write(b"k", b"v");
        assert_eq!(
            result.unwrap_err(),
            crate::backend::BackendError::unknown("disk full")
        );
        assert_eq!(gas.externally_used, 5);
    }

    #[test]
    fn test_missing_slot() {
        let db = test_db();
        let (result, gas) = db.remove(b"k");
        assert!(result.is_err());
        assert_eq!(gas, GasInfo::free());
    }

    #[test]
    fn test_hex_preview_truncates() {
        assert_eq!(hex_preview(b"ab"), "0x6162");
        assert!(hex_preview(&[0u8; 40]).ends_with("..."));
    }
}
