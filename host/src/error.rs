//! Errors surfaced to host callers of the engine.

use vmbridge_primitives::{ErrnoValue, UnmanagedVector};

/// Failure of a module lifecycle operation or entry-point call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    /// The gas limit was exhausted, by the contract or by a callback.
    #[error("out of gas")]
    OutOfGas,

    /// The engine or the contract failed.
    #[error("engine failure: {msg}")]
    EngineFailure { msg: String },

    /// A host capability failed during the call.
    #[error("capability failure: {msg}")]
    CapabilityFailure { msg: String },

    /// An argument was rejected before the engine ran.
    #[error("invalid argument: {msg}")]
    InvalidArgument { msg: String },

    /// The engine failed without saying why.
    #[error("engine returned error code {code} without a message")]
    Opaque { code: i32 },
}

impl VmError {
    pub fn engine_failure(msg: impl Into<String>) -> Self {
        Self::EngineFailure { msg: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument { msg: msg.into() }
    }
}

/// Build the error for a failed engine export.
///
/// `error_msg` is always consumed. Out of gas ignores any message; any other
/// code without a message becomes [`VmError::Opaque`].
pub fn error_with_message(code: i32, error_msg: UnmanagedVector) -> VmError {
    let msg = error_msg
        .consume()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

    match (ErrnoValue::from_i32(code), msg) {
        (Some(ErrnoValue::OutOfGas), _) => VmError::OutOfGas,
        (_, None) => VmError::Opaque { code },
        (Some(ErrnoValue::InvalidArgument), Some(msg)) => VmError::InvalidArgument { msg },
        (Some(ErrnoValue::CapabilityFailure), Some(msg)) => VmError::CapabilityFailure { msg },
        (_, Some(msg)) => VmError::EngineFailure { msg },
    }
}
