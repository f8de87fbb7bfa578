//! Status codes carried across the FFI boundary.
//!
//! Two independent code spaces exist. [`CallbackStatus`] is returned by host
//! callbacks to the engine; [`ErrnoValue`] is returned by engine exports to
//! the host. Both travel as plain `i32` and MUST keep these values.

use std::fmt;

/// Status returned by a host callback (store, iterator, address codec, querier).
///
/// `0` = OK, negative = failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CallbackStatus {
    Ok = 0,
    Panic = -1,
    BadArgument = -2,
    OutOfGas = -3,
    Other = -4,
    User = -5,
}

impl CallbackStatus {
    /// Convert from an i32 returned by a callback.
    ///
    /// Callback implementations are not trusted, so unknown codes collapse to
    /// [`CallbackStatus::Other`] instead of failing.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            -1 => Self::Panic,
            -2 => Self::BadArgument,
            -3 => Self::OutOfGas,
            -4 => Self::Other,
            -5 => Self::User,
            _ => Self::Other,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for CallbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Panic => write!(f, "ERR_PANIC"),
            Self::BadArgument => write!(f, "ERR_BAD_ARGUMENT"),
            Self::OutOfGas => write!(f, "ERR_OUT_OF_GAS"),
            Self::Other => write!(f, "ERR_OTHER"),
            Self::User => write!(f, "ERR_USER"),
        }
    }
}

/// Status returned by every engine export.
///
/// `OutOfGas` (2) is the sentinel hosts use to tell metering failures apart
/// from contract failures; it is never paired with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrnoValue {
    Success = 0,
    Other = 1,
    OutOfGas = 2,
    InvalidArgument = 3,
    CapabilityFailure = 4,
}

impl ErrnoValue {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::Other),
            2 => Some(Self::OutOfGas),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::CapabilityFailure),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ErrnoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Other => write!(f, "ERRNO_OTHER"),
            Self::OutOfGas => write!(f, "ERRNO_OUT_OF_GAS"),
            Self::InvalidArgument => write!(f, "ERRNO_INVALID_ARGUMENT"),
            Self::CapabilityFailure => write!(f, "ERRNO_CAPABILITY_FAILURE"),
        }
    }
}
