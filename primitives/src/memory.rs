//! Buffer protocol for moving bytes across the FFI boundary.
//!
//! Two wire shapes exist:
//!
//! - [`ByteSliceView`]: a borrowed view. No ownership is transferred. The
//!   producer keeps the backing slice alive until the call that receives the
//!   view returns; the receiver copies out anything it needs later and never
//!   stores the raw pointer.
//! - [`UnmanagedVector`]: an owned allocation. Ownership moves to the
//!   receiver, who must release it exactly once via [`UnmanagedVector::consume`]
//!   or [`destroy_unmanaged_vector`].
//!
//! Both are `#[repr(C)]` so either side of the boundary can be written in
//! another language.

use std::mem::ManuallyDrop;
use std::ptr;

/// A non-owning, call-scoped view of a byte slice.
///
/// `is_nil` distinguishes "no value" from "empty value", so an absent
/// optional argument never collapses into `b""`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ByteSliceView {
    is_nil: bool,
    ptr: *const u8,
    len: usize,
}

impl ByteSliceView {
    /// Create a view over `source` without copying.
    ///
    /// The caller must keep `source` alive and unmoved until the call the
    /// view is passed to has returned.
    pub fn new(source: &[u8]) -> Self {
        Self {
            is_nil: false,
            ptr: source.as_ptr(),
            len: source.len(),
        }
    }

    /// Create a view over an optional slice; `None` becomes a nil view.
    pub fn from_option(source: Option<&[u8]>) -> Self {
        match source {
            Some(data) => Self::new(data),
            None => Self::nil(),
        }
    }

    /// A view representing "no value".
    pub fn nil() -> Self {
        Self {
            is_nil: true,
            ptr: ptr::null(),
            len: 0,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.is_nil
    }

    /// Borrow the viewed bytes. Returns `None` for a nil view.
    ///
    /// # Safety
    ///
    /// Must only be called while the call that received this view is still
    /// running, and the producer must have upheld the keep-alive contract.
    pub unsafe fn read(&self) -> Option<&[u8]> {
        if self.is_nil {
            return None;
        }
        if self.len == 0 {
            // ptr may be dangling or null for an empty slice
            return Some(&[]);
        }
        if self.ptr.is_null() {
            return None;
        }
        Some(std::slice::from_raw_parts(self.ptr, self.len))
    }

    /// Copy the viewed bytes into a new `Vec`. Returns `None` for a nil view.
    ///
    /// # Safety
    ///
    /// Same as [`ByteSliceView::read`].
    pub unsafe fn to_owned(&self) -> Option<Vec<u8>> {
        self.read().map(|data| data.to_vec())
    }
}

/// An owned byte vector whose ownership is handed across the boundary.
///
/// The tri-state is: `is_none == true` (absent), present with `len == 0`
/// (empty), present with data. The type is neither `Copy` nor `Clone`, so a
/// value can be consumed only once on the Rust side. There is no `Drop` impl;
/// a vector written into an out-parameter belongs to whoever reads that slot.
///
/// Out-parameter slots must hold a none vector when handed to the other side;
/// overwriting a present vector leaks it.
#[repr(C)]
#[derive(Debug)]
pub struct UnmanagedVector {
    is_none: bool,
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

impl UnmanagedVector {
    /// Take ownership of `source` without copying.
    pub fn new(source: Option<Vec<u8>>) -> Self {
        match source {
            Some(data) => {
                let mut data = ManuallyDrop::new(data);
                Self {
                    is_none: false,
                    ptr: data.as_mut_ptr(),
                    len: data.len(),
                    cap: data.capacity(),
                }
            }
            None => Self::none(),
        }
    }

    pub fn some(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(data.into()))
    }

    pub fn none() -> Self {
        Self {
            is_none: true,
            ptr: ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.is_none
    }

    pub fn is_some(&self) -> bool {
        !self.is_none
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release the vector, returning its contents.
    ///
    /// This is the single hand-off point back into Rust ownership. The value
    /// must have been created by [`UnmanagedVector::new`] (or the
    /// [`new_unmanaged_vector`] export) in this process.
    pub fn consume(self) -> Option<Vec<u8>> {
        if self.is_none {
            return None;
        }
        if self.cap == 0 {
            // An empty Vec never allocated; its pointer is dangling.
            return Some(Vec::new());
        }
        // SAFETY: ptr/len/cap were taken from a Vec that was forgotten in `new`,
        // and `self` is moved in, so this runs at most once per allocation.
        Some(unsafe { Vec::from_raw_parts(self.ptr, self.len, self.cap) })
    }
}

impl Default for UnmanagedVector {
    fn default() -> Self {
        Self::none()
    }
}

/// Copy `length` foreign bytes into a new [`UnmanagedVector`].
///
/// `nil == true` produces a none vector regardless of `ptr`.
///
/// # Safety
///
/// When `nil` is false and `length > 0`, `ptr` must point to `length`
/// readable bytes for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn new_unmanaged_vector(
    nil: bool,
    ptr: *const u8,
    length: usize,
) -> UnmanagedVector {
    if nil {
        return UnmanagedVector::none();
    }
    if length == 0 {
        return UnmanagedVector::some(Vec::new());
    }
    if ptr.is_null() {
        return UnmanagedVector::none();
    }
    let data = std::slice::from_raw_parts(ptr, length).to_vec();
    UnmanagedVector::some(data)
}

/// Release an [`UnmanagedVector`] handed over by the other side.
#[no_mangle]
pub extern "C" fn destroy_unmanaged_vector(v: UnmanagedVector) {
    let _ = v.consume();
}
