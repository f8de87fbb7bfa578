//! Invocation frames: the iterators a contract opens during one call.
//!
//! Every entry-point call starts a frame with a fresh id. Iterators opened by
//! `scan_db` are stored in that frame and addressed by
//! `(frame_id, iterator_index)`. Dropping the [`FrameGuard`] removes the
//! frame and everything in it, so nothing survives the call that opened it.
//!
//! The registry lock is held only to look a frame up. Each frame has its own
//! lock, so a slow host iterator stalls only the call that is advancing it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use vmbridge_hostapi::{HostError, StorageIterator};
use vmbridge_primitives::Record;

type Frame = Arc<Mutex<Vec<StorageIterator>>>;

static FRAMES: Lazy<Mutex<HashMap<u64, Frame>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Next frame id. Starts at 1 so a zeroed `iterator_t` never names a frame.
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Owns a frame for as long as it lives.
#[derive(Debug)]
pub struct FrameGuard {
    id: u64,
}

impl FrameGuard {
    pub fn start() -> Self {
        let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
        FRAMES.lock().insert(id, Frame::default());
        tracing::debug!(frame_id = id, "started invocation frame");
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let removed = FRAMES.lock().remove(&self.id);
        tracing::debug!(
            frame_id = self.id,
            iterators = removed.as_ref().map_or(0, |frame| frame.lock().len()),
            "ended invocation frame"
        );
    }
}

fn frame(frame_id: u64) -> Result<Frame, HostError> {
    FRAMES
        .lock()
        .get(&frame_id)
        .cloned()
        .ok_or_else(HostError::bad_argument)
}

/// Store an iterator in a live frame and return its index.
pub fn store_iterator(frame_id: u64, iter: StorageIterator) -> Result<u64, HostError> {
    let frame = frame(frame_id)?;
    let mut iterators = frame.lock();
    iterators.push(iter);
    Ok((iterators.len() - 1) as u64)
}

/// Advance an iterator. Unknown frames or indices are bad arguments.
pub fn next_record(frame_id: u64, index: u64) -> Result<Option<Record>, HostError> {
    let frame = frame(frame_id)?;
    let mut iterators = frame.lock();
    let iter = usize::try_from(index)
        .ok()
        .and_then(|i| iterators.get_mut(i))
        .ok_or_else(HostError::bad_argument)?;
    Ok(iter.next())
}

pub fn is_active(frame_id: u64) -> bool {
    FRAMES.lock().contains_key(&frame_id)
}
