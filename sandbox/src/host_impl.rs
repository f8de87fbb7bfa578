//! Per-call mutable state held in the Wasmtime Store.
//!
//! `InstanceState` carries the host capability tables, the iterators the
//! contract has opened, the memory limiter and the host allocator for the
//! duration of one entry-point call.

use wasmtime::{StoreLimits, StoreLimitsBuilder};

use crate::backend::{Backend, BackendError, BackendResult, GasInfo};
use crate::iterator::DbIter;
use crate::memory::HostAllocator;
use vmbridge_primitives::Record;

/// Per-call mutable state held in the Wasmtime `Store`.
///
/// Created fresh for each call and dropped with the instance.
pub struct InstanceState {
    pub backend: Backend,
    /// Iterators opened by `db_scan`, addressed by their index.
    pub iterators: Vec<DbIter>,
    pub limits: StoreLimits,
    /// Whether `debug` imports are forwarded to the log.
    pub print_debug: bool,
    /// Host-side bump allocator for guest memory.
    pub host_alloc: HostAllocator,
}

impl InstanceState {
    pub fn new(backend: Backend, memory_limit_bytes: usize, print_debug: bool) -> Self {
        let limits = StoreLimitsBuilder::new()
            .memory_size(memory_limit_bytes)
            .instances(1)
            .memories(1)
            .build();
        Self {
            backend,
            iterators: Vec::new(),
            limits,
            print_debug,
            // Initialized empty; the runtime sets the real region after instantiation
            host_alloc: HostAllocator::default(),
        }
    }

    /// Keep an iterator and return the id the contract uses for it.
    pub fn store_iterator(&mut self, iter: DbIter) -> u32 {
        self.iterators.push(iter);
        (self.iterators.len() - 1) as u32
    }

    pub fn next_record(&mut self, id: u32) -> BackendResult<Option<Record>> {
        match self.iterators.get_mut(id as usize) {
            Some(iter) => iter.next(),
            None => (
                Err(BackendError::IteratorDoesNotExist { id }),
                GasInfo::free(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Api, ApiVtable};
    use crate::db::{Db, DbVtable};
    use crate::querier::{Querier, QuerierVtable};

    fn empty_backend() -> Backend {
        Backend {
            db: Db {
                gas_meter: std::ptr::null_mut(),
                state: std::ptr::null_mut(),
                vtable: DbVtable::default(),
            },
            api: Api {
                state: std::ptr::null(),
                vtable: ApiVtable::default(),
            },
            querier: Querier {
                state: std::ptr::null(),
                vtable: QuerierVtable::default(),
            },
        }
    }

    #[test]
    fn test_iterator_ids_are_sequential() {
        let mut state = InstanceState::new(empty_backend(), 1 << 20, false);
        assert_eq!(state.store_iterator(DbIter::default()), 0);
        assert_eq!(state.store_iterator(DbIter::default()), 1);
    }

    #[test]
    fn test_unknown_iterator() {
        let mut state = InstanceState::new(empty_backend(), 1 << 20, false);
        let (result, gas) = state.next_record(3);
        assert_eq!(result.unwrap_err(), BackendError::IteratorDoesNotExist { id: 3 });
        assert_eq!(gas, GasInfo::free());
    }
}
