//! `FramedBuffer`: an outbound byte queue with a "detached head" discipline.
//!
//! The buffer coalesces small appends into a single contiguous block suitable
//! for one write call, while letting a concurrent caller keep appending to a
//! fresh tail. At most one block is ever "detached" (on loan to an in-flight
//! write) at a time.
//!
//! This is a plain data structure, not a synchronization primitive: callers
//! (`TcpConnection`, `KcpConnection`) serialize access to it behind their own
//! `send_lock` (see `netkit_transport`).

use bytes::{BufMut, Bytes, BytesMut};

/// Outbound byte queue with at most one in-flight "detached head".
#[derive(Debug, Default)]
pub struct FramedBuffer {
    tail: BytesMut,
    /// `Some` while a write is in flight on the previously detached block.
    /// `true` means the head was orphaned by a `clear()` call while detached
    /// and `free_detached` should not be treated as delivering real bytes.
    head: Option<bool>,
}

impl FramedBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the tail.
    pub fn push(&mut self, bytes: &[u8]) {
        self.tail.put_slice(bytes);
    }

    /// Bytes currently buffered in the tail (excludes any detached head).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tail.len()
    }

    /// True iff no tail bytes are buffered. Ignores a detached head.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    /// If no head is currently detached and the tail is non-empty, move the
    /// tail into the head slot and return it as an immutable, refcounted
    /// block ready for a single write call. Otherwise returns `None`.
    pub fn detach_head(&mut self) -> Option<Bytes> {
        if self.head.is_some() || self.tail.is_empty() {
            return None;
        }
        self.head = Some(false);
        Some(std::mem::take(&mut self.tail).freeze())
    }

    /// Release the previously detached head. Must be called exactly once per
    /// successful `detach_head`.
    ///
    /// # Panics
    ///
    /// Panics if no head is currently detached — callers own the detach/free
    /// pairing and a double-free indicates a bug in the write state machine.
    pub fn free_detached(&mut self) {
        assert!(self.head.take().is_some(), "free_detached with no detached head");
    }

    /// Drop all buffered tail bytes. A detached head currently on loan to an
    /// in-flight write is not recalled; it is marked orphaned so the eventual
    /// `free_detached` still succeeds without anyone mistaking it for having
    /// delivered real application data.
    pub fn clear(&mut self) {
        self.tail.clear();
        if self.head.is_some() {
            self.head = Some(true);
        }
    }
}
