// SPDX-FileCopyrightText: © 2026 Airwave Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Reference-counted store for broadcast buffers.
//!
//! When the orchestrator fans a serialized chunk out to `N` workers it knows
//! the fan-out degree up front, so the buffer is inserted with `uses = N` and
//! every worker releases its handle exactly once after delivering the frame
//! to its subscribers. The `N`th release frees the slot. Slot indices are
//! dense and recycled through a free list.
//!
//! The store is the one object shared between tasks: `insert` is only ever
//! called by the orchestrator, `release` may be called from any worker.

use std::sync::Mutex;

use bytes::Bytes;

use crate::ids::BufferId;

struct Slot {
    bytes: Bytes,
    remaining: usize,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Option<Slot>>,
    free: Vec<usize>,
}

/// A mapping from buffer id to `(bytes, refcount)`.
#[derive(Default)]
pub struct BufferStore {
    inner: Mutex<Slots>,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` with an initial refcount of `uses` and returns a
    /// stable id for it.
    ///
    /// # Panics
    ///
    /// Panics if `uses` is zero; a buffer nobody will release would leak its
    /// slot forever.
    pub fn insert(&self, bytes: Bytes, uses: usize) -> BufferId {
        assert!(uses > 0, "broadcast buffers must have at least one use");

        let slot = Slot { bytes, remaining: uses };

        // Mutex poisoning is a fatal error - standard pattern in Rust
        #[allow(clippy::unwrap_used)]
        let mut slots = self.inner.lock().unwrap();
        if let Some(idx) = slots.free.pop() {
            slots.entries[idx] = Some(slot);
            BufferId(idx)
        } else {
            slots.entries.push(Some(slot));
            BufferId(slots.entries.len() - 1)
        }
    }

    /// Returns a cheap clone of the stored bytes, or `None` if the id is not
    /// live.
    pub fn get(&self, id: BufferId) -> Option<Bytes> {
        #[allow(clippy::unwrap_used)]
        let slots = self.inner.lock().unwrap();
        slots.entries.get(id.0).and_then(|e| e.as_ref()).map(|s| s.bytes.clone())
    }

    /// Consumes one use of the buffer. Returns `true` when this was the last
    /// use and the slot has been freed.
    ///
    /// Releasing an id that is not live is a contract violation by the
    /// caller; it is logged and otherwise ignored so one misbehaving worker
    /// cannot free another worker's buffer out from under it.
    pub fn release(&self, id: BufferId) -> bool {
        #[allow(clippy::unwrap_used)]
        let mut slots = self.inner.lock().unwrap();
        let Some(slot) = slots.entries.get_mut(id.0).and_then(|e| e.as_mut()) else {
            tracing::warn!(buffer = id.0, "release of a buffer that is not live");
            return false;
        };

        slot.remaining -= 1;
        if slot.remaining == 0 {
            slots.entries[id.0] = None;
            slots.free.push(id.0);
            true
        } else {
            false
        }
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        let slots = self.inner.lock().unwrap();
        slots.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
