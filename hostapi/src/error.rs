//! Host-side error types for capability implementations.
//!
//! `HostError` is returned by the [`Storage`](crate::Storage),
//! [`AddressCodec`](crate::AddressCodec) and [`Querier`](crate::Querier)
//! traits. The callback bridge turns it into a [`CallbackStatus`] for the
//! engine plus an optional message.

use vmbridge_primitives::CallbackStatus;
use std::fmt;

/// Error returned by host capability implementations.
///
/// The engine sees the `i32` status via [`to_status`](HostError::to_status).
/// `User` and `Internal` additionally carry a message that is handed to the
/// engine through the callback's `error_msg` out-parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A bare status with no message.
    Code(CallbackStatus),
    /// An expected, contract-visible failure (e.g. a malformed address).
    /// Returned to the engine as `ERR_USER` (-5).
    User(String),
    /// A failure of the host itself.
    /// Returned to the engine as `ERR_OTHER` (-4).
    Internal(String),
}

impl HostError {
    /// Convert to the `i32` status returned to the engine. An error is never
    /// reported as `Ok`.
    pub fn to_status(&self) -> i32 {
        match self {
            Self::Code(CallbackStatus::Ok) => CallbackStatus::Other.as_i32(),
            Self::Code(code) => code.as_i32(),
            Self::User(_) => CallbackStatus::User.as_i32(),
            Self::Internal(_) => CallbackStatus::Other.as_i32(),
        }
    }

    /// The message handed to the engine alongside the status, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Code(_) => None,
            Self::User(msg) | Self::Internal(msg) => Some(msg),
        }
    }

    /// Create an out-of-gas error.
    pub fn out_of_gas() -> Self {
        Self::Code(CallbackStatus::OutOfGas)
    }

    /// Create a bad-argument error.
    pub fn bad_argument() -> Self {
        Self::Code(CallbackStatus::BadArgument)
    }

    /// Create a user error.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "host error: {}", code),
            Self::User(msg) => write!(f, "user error: {}", msg),
            Self::Internal(msg) => write!(f, "internal host error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<CallbackStatus> for HostError {
    fn from(code: CallbackStatus) -> Self {
        Self::Code(code)
    }
}
