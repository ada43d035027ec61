//! `IoBytes`: a thin adapter letting a refcounted `Bytes` handle serve as an
//! owned buffer for `compio`'s ownership-passing write calls.
//!
//! This is the only module in this crate where `unsafe` is permitted — the
//! `IoBuf` contract is upheld by `Bytes` itself (immutable, refcounted,
//! contiguous), so the impl below is a direct, non-allocating restatement of
//! guarantees `Bytes` already provides.

#![allow(unsafe_code)]

use bytes::Bytes;

/// Wraps a `Bytes` so it can be handed to `compio::io::AsyncWrite::write`.
#[derive(Debug, Clone)]
pub struct IoBytes(Bytes);

impl IoBytes {
    #[must_use]
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for IoBytes {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<IoBytes> for Bytes {
    fn from(io_bytes: IoBytes) -> Self {
        io_bytes.0
    }
}

// SAFETY: `Bytes` is immutable, refcounted, and contiguous; the pointer/len
// pair below stays valid for as long as this `IoBytes` (and thus the `Bytes`
// it owns) is alive, which compio guarantees for the duration of the I/O op.
unsafe impl compio::buf::IoBuf for IoBytes {
    #[inline]
    fn as_buf_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    #[inline]
    fn buf_len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn buf_capacity(&self) -> usize {
        self.0.len()
    }
}
