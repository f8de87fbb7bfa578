//! Guest linear memory helpers with bounds checking.
//!
//! Guest pointers are `u32` offsets into the instance's exported memory.
//! Every access is validated against the current memory size; out-of-bounds
//! access returns `VmError::Memory`.

use wasmtime::{AsContextMut, Memory};

use crate::config::WASM_PAGE_SIZE;
use crate::error::VmError;
use crate::host_impl::InstanceState;

/// Initial host allocation region size in pages (4 pages = 256 KiB).
pub const HOST_ALLOC_PAGES: u64 = 4;

fn checked_range(mem_len: usize, ptr: u32, len: u32) -> Result<std::ops::Range<usize>, VmError> {
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or_else(|| VmError::Memory(format!("range overflow at {}+{}", ptr, len)))?;
    if end > mem_len {
        return Err(VmError::Memory(format!(
            "range {}..{} out of bounds (memory size {})",
            start, end, mem_len
        )));
    }
    Ok(start..end)
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: u32) -> Result<Vec<u8>, VmError> {
    let range = checked_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), VmError> {
    let len = u32::try_from(data.len())
        .map_err(|_| VmError::Memory(format!("buffer of {} bytes too large", data.len())))?;
    let range = checked_range(mem.len(), ptr, len)?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian u32 from guest memory at `ptr`.
pub fn read_u32(mem: &[u8], ptr: u32) -> Result<u32, VmError> {
    let range = checked_range(mem.len(), ptr, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&mem[range]);
    Ok(u32::from_le_bytes(buf))
}

/// Write a little-endian u32 to guest memory at `ptr`.
pub fn write_u32(mem: &mut [u8], ptr: u32, value: u32) -> Result<(), VmError> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}

/// Validate that `[ptr, ptr+len)` lies within a memory of `mem_len` bytes.
pub fn validate_range(mem_len: usize, ptr: u32, len: u32) -> Result<(), VmError> {
    checked_range(mem_len, ptr, len).map(|_| ())
}

fn align8(size: usize) -> usize {
    (size + 7) & !7
}

/// A pending allocation computed by [`HostAllocator::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub ptr: usize,
    bump: usize,
    capacity: usize,
    /// Pages the memory must grow by before `ptr` can be written.
    pub grow_pages: u64,
}

/// Bump allocator for host-written buffers inside guest memory.
///
/// After instantiation the runtime grows memory to reserve a region past the
/// guest's own data. Arguments and callback results are written there. There
/// is no deallocation; the instance lives for one call.
#[derive(Debug, Clone, Default)]
pub struct HostAllocator {
    /// Base address of the region in guest memory.
    pub base: usize,
    /// Current bump offset from base.
    pub bump: usize,
    /// Total bytes available in the region.
    pub capacity: usize,
}

impl HostAllocator {
    pub fn new(base: usize, capacity: usize) -> Self {
        Self {
            base,
            bump: 0,
            capacity,
        }
    }

    /// Move the region to `memory_end` when the guest has grown memory past
    /// it. Pages beyond the region belong to the guest and are never reused.
    pub fn follow_memory_end(&mut self, memory_end: usize) {
        if memory_end != self.base + self.capacity {
            self.base = memory_end;
            self.bump = 0;
            self.capacity = 0;
        }
    }

    /// Compute where `size` bytes would go and how much memory must grow.
    pub fn reserve(&self, size: usize) -> Reservation {
        let aligned = align8(size.max(1));
        let ptr = self.base + self.bump;
        let bump = self.bump + aligned;
        if bump <= self.capacity {
            Reservation {
                ptr,
                bump,
                capacity: self.capacity,
                grow_pages: 0,
            }
        } else {
            let deficit = bump - self.capacity;
            let grow_pages = deficit.div_ceil(WASM_PAGE_SIZE as usize) as u64;
            Reservation {
                ptr,
                bump,
                capacity: self.capacity + (grow_pages * WASM_PAGE_SIZE) as usize,
                grow_pages,
            }
        }
    }

    /// Apply a reservation once its memory has been grown and written.
    pub fn commit(&mut self, reservation: Reservation) {
        self.bump = reservation.bump;
        self.capacity = reservation.capacity;
    }
}

/// Copy `data` into the host allocation region and return its guest pointer.
pub fn alloc_and_write(
    memory: &Memory,
    mut store: impl AsContextMut<Data = InstanceState>,
    data: &[u8],
) -> Result<u32, VmError> {
    let memory_end = memory.data_size(&store);
    let mut context = store.as_context_mut();
    let host_alloc = &mut context.data_mut().host_alloc;
    host_alloc.follow_memory_end(memory_end);
    let reservation = host_alloc.reserve(data.len());
    if reservation.grow_pages > 0 {
        memory
            .grow(&mut store, reservation.grow_pages)
            .map_err(|e| VmError::Memory(format!("host allocation grow: {}", e)))?;
    }
    let ptr = u32::try_from(reservation.ptr)
        .map_err(|_| VmError::Memory("host allocation beyond 4 GiB".into()))?;
    write_bytes(memory.data_mut(&mut store), ptr, data)?;
    store.as_context_mut().data_mut().host_alloc.commit(reservation);
    Ok(ptr)
}

/// Write a buffer and its location into the guest's `(ptr, len)` out slots.
pub fn write_out_slots(
    memory: &Memory,
    mut store: impl AsContextMut<Data = InstanceState>,
    data: &[u8],
    out_ptr_ptr: u32,
    out_len_ptr: u32,
) -> Result<(), VmError> {
    {
        let size = memory.data_size(&store);
        validate_range(size, out_ptr_ptr, 4)?;
        validate_range(size, out_len_ptr, 4)?;
    }
    let ptr = alloc_and_write(memory, &mut store, data)?;
    let mem = memory.data_mut(&mut store);
    write_u32(mem, out_ptr_ptr, ptr)?;
    write_u32(mem, out_len_ptr, data.len() as u32)?;
    Ok(())
}
