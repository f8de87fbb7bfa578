//! Engine error types.

use vmbridge_primitives::ErrnoValue;

use crate::backend::BackendError;

/// Top-level error type for the engine crate.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Wasmtime engine or store configuration error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module storage failed (missing file, I/O, corrupted data).
    #[error("cache error: {0}")]
    Cache(String),

    /// The bytes are not a loadable wasm module.
    #[error("compile error: {0}")]
    Compile(String),

    /// Module validation failed (missing memory, bad imports, capabilities).
    #[error("static validation error: {0}")]
    StaticValidation(String),

    #[error("instantiation error: {0}")]
    Instantiation(String),

    /// The contract trapped or the engine failed while running it.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The contract returned an error result.
    #[error("contract error: {0}")]
    Contract(String),

    /// Gas limit exhausted, by the contract or by a host callback.
    #[error("out of gas")]
    OutOfGas,

    /// A host callback failed.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// Guest memory access failed (out-of-bounds, grow failure).
    #[error("memory error: {0}")]
    Memory(String),

    /// A null or malformed argument was passed to an export.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("caught panic")]
    Panic,
}

impl VmError {
    /// Status reported to the host for this error.
    pub fn errno(&self) -> ErrnoValue {
        match self {
            Self::OutOfGas => ErrnoValue::OutOfGas,
            Self::InvalidArgument(_) => ErrnoValue::InvalidArgument,
            Self::Backend(_) => ErrnoValue::CapabilityFailure,
            _ => ErrnoValue::Other,
        }
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<BackendError> for VmError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::OutOfGas => Self::OutOfGas,
            other => Self::Backend(other),
        }
    }
}
