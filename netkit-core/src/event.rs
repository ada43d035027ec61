//! `NetEvent` and the thread-safe `EventQueue` that buffers them between the
//! I/O threads and the application's dispatching thread.

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::ErrorKind;
use crate::key::NetKey;

/// A network occurrence produced by a connection and consumed by `EventDriver::run_one`.
///
/// `Recv` carries its payload inline as a `Bytes` handle. Unlike a C-style
/// fixed-size event record backed by a side-channel byte queue, `Bytes` is
/// already a small, cheap-to-move handle (pointer + length + refcount), so
/// folding the payload into the event itself keeps `NetEvent` a plain value
/// type while preserving the same "event and payload travel together"
/// invariant the side-channel design existed to guarantee.
#[derive(Debug, Clone)]
pub enum NetEvent {
    Accept { key: NetKey, ip: Ipv4Addr, port: u16 },
    Connect { key: NetKey, ip: Ipv4Addr, port: u16 },
    Disconnect { key: NetKey, ip: Ipv4Addr, port: u16 },
    Recv { key: NetKey, payload: Bytes },
    Error { key: NetKey, kind: ErrorKind },
}

impl NetEvent {
    #[must_use]
    pub const fn key(&self) -> NetKey {
        match self {
            Self::Accept { key, .. }
            | Self::Connect { key, .. }
            | Self::Disconnect { key, .. }
            | Self::Recv { key, .. }
            | Self::Error { key, .. } => *key,
        }
    }
}

/// Thread-safe FIFO of `NetEvent`s.
///
/// The lock is held only for the enqueue/dequeue operation itself; handlers
/// invoked by `EventDriver::run_one` never run under it.
#[derive(Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<NetEvent>>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_accept(&self, key: NetKey, ip: Ipv4Addr, port: u16) {
        self.events.lock().push_back(NetEvent::Accept { key, ip, port });
    }

    pub fn push_connect(&self, key: NetKey, ip: Ipv4Addr, port: u16) {
        self.events.lock().push_back(NetEvent::Connect { key, ip, port });
    }

    pub fn push_disconnect(&self, key: NetKey, ip: Ipv4Addr, port: u16) {
        self.events.lock().push_back(NetEvent::Disconnect { key, ip, port });
    }

    /// Enqueues a `Recv` event. Silently drops the (malformed) zero-length case.
    pub fn push_recv(&self, key: NetKey, payload: Bytes) {
        if payload.is_empty() {
            return;
        }
        self.events.lock().push_back(NetEvent::Recv { key, payload });
    }

    pub fn push_error(&self, key: NetKey, kind: ErrorKind) {
        self.events.lock().push_back(NetEvent::Error { key, kind });
    }

    /// Pop the oldest event, if any.
    pub fn pop_one(&self) -> Option<NetEvent> {
        self.events.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
