//! Host-side gas meter threaded through every callback.
//!
//! The entry-point invoker hands the meter to the engine as an opaque
//! `gas_meter_t` pointer. Each store, iterator, address and query callback
//! charges it with the cost from `vmbridge_primitives::gas` and reports the
//! same amount back to the engine as `used_gas`.

use crate::error::HostError;

/// Gas consumed on the host side of one or more entry-point calls.
///
/// A rejected charge leaves the meter unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostGasMeter {
    limit: u64,
    consumed: u64,
    callbacks: u64,
}

impl HostGasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            consumed: 0,
            callbacks: 0,
        }
    }

    /// Charge one callback. Fails with `OutOfGas` if the limit would be
    /// exceeded.
    pub fn charge(&mut self, cost: u64) -> Result<(), HostError> {
        match self.consumed.checked_add(cost) {
            Some(total) if total <= self.limit => {
                self.consumed = total;
                self.callbacks += 1;
                Ok(())
            }
            _ => Err(HostError::out_of_gas()),
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of callbacks charged successfully.
    pub fn callbacks(&self) -> u64 {
        self.callbacks
    }
}
