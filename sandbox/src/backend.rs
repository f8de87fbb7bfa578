//! Engine-side view of the host capabilities.
//!
//! The host hands the engine one [`Db`], [`Api`] and [`Querier`] table per
//! call. The typed adapters in `db`, `iterator`, `api` and `querier` wrap
//! each raw vtable call and return a [`BackendResult`]: the outcome plus the
//! gas the host reported for it.

use vmbridge_primitives::{CallbackStatus, UnmanagedVector};

use crate::api::Api;
use crate::db::Db;
use crate::querier::Querier;

/// The capability tables bound to a single call.
#[derive(Debug, Clone, Copy)]
pub struct Backend {
    pub db: Db,
    pub api: Api,
    pub querier: Querier,
}

/// Gas reported by a host callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasInfo {
    /// Gas the host consumed on its side of the callback.
    pub externally_used: u64,
}

impl GasInfo {
    pub fn with_externally_used(externally_used: u64) -> Self {
        Self { externally_used }
    }

    pub fn free() -> Self {
        Self::default()
    }
}

/// Result of a callback together with the gas it used. The gas is reported
/// on both success and failure.
pub type BackendResult<T> = (Result<T, BackendError>, GasInfo);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Panic in FFI call")]
    ForeignPanic,

    #[error("Bad argument")]
    BadArgument,

    #[error("Ran out of gas during call into backend")]
    OutOfGas,

    #[error("Iterator with ID {id} does not exist")]
    IteratorDoesNotExist { id: u32 },

    #[error("User error during call into backend: {msg}")]
    UserErr { msg: String },

    #[error("Unknown error during call into backend: {msg}")]
    Unknown { msg: String },
}

impl BackendError {
    pub fn user_err(msg: impl Into<String>) -> Self {
        Self::UserErr { msg: msg.into() }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown { msg: msg.into() }
    }
}

/// Translate a callback status into a result.
///
/// `error_msg` is always consumed, so the allocation is released even when
/// the status is OK. `default` supplies a message when the host sent none.
pub fn status_into_result<F>(
    code: i32,
    error_msg: UnmanagedVector,
    default: F,
) -> Result<(), BackendError>
where
    F: FnOnce() -> String,
{
    let msg = error_msg
        .consume()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    match CallbackStatus::from_i32(code) {
        CallbackStatus::Ok => Ok(()),
        CallbackStatus::Panic => Err(BackendError::ForeignPanic),
        CallbackStatus::BadArgument => Err(BackendError::BadArgument),
        CallbackStatus::OutOfGas => Err(BackendError::OutOfGas),
        CallbackStatus::User => Err(BackendError::UserErr {
            msg: msg.unwrap_or_else(default),
        }),
        CallbackStatus::Other => Err(BackendError::Unknown {
            msg: msg.unwrap_or_else(default),
        }),
    }
}

/// Error for a vtable slot the host left empty.
pub(crate) fn missing_callback(name: &str) -> BackendError {
    BackendError::unknown(format!("vtable function '{}' not set", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_msg() -> String {
        "default".to_string()
    }

    #[test]
    fn test_ok_status() {
        assert_eq!(status_into_result(0, UnmanagedVector::none(), default_msg), Ok(()));
        // message on success is released and ignored
        assert_eq!(
            status_into_result(0, UnmanagedVector::some(b"ignored".to_vec()), default_msg),
            Ok(())
        );
    }

    #[test]
    fn test_fixed_statuses() {
        assert_eq!(
            status_into_result(-1, UnmanagedVector::none(), default_msg),
            Err(BackendError::ForeignPanic)
        );
        assert_eq!(
            status_into_result(-2, UnmanagedVector::none(), default_msg),
            Err(BackendError::BadArgument)
        );
        assert_eq!(
            status_into_result(-3, UnmanagedVector::some(b"x".to_vec()), default_msg),
            Err(BackendError::OutOfGas)
        );
    }

    #[test]
    fn test_message_statuses() {
        assert_eq!(
            status_into_result(-5, UnmanagedVector::some(b"bad address".to_vec()), default_msg),
            Err(BackendError::user_err("bad address"))
        );
        assert_eq!(
            status_into_result(-4, UnmanagedVector::none(), default_msg),
            Err(BackendError::unknown("default"))
        );
    }

    #[test]
    fn test_unknown_status_is_other() {
        assert_eq!(
            status_into_result(42, UnmanagedVector::some(b"weird".to_vec()), default_msg),
            Err(BackendError::unknown("weird"))
        );
    }

    #[test]
    fn test_gas_info() {
        assert_eq!(GasInfo::free().externally_used, 0);
        assert_eq!(GasInfo::with_externally_used(7).externally_used, 7);
    }
}
