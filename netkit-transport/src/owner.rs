//! `ConnectionOwner`: the registry of live connections keyed by `NetKey`.

use std::sync::Arc;

use dashmap::DashMap;
use netkit_core::key::NetKey;

/// Shared behavior exposed by both `TcpConnection` and `KcpConnection` to the
/// owner and to application code that only has a `NetKey` in hand.
pub trait Connection: Send + Sync {
    /// Enqueue `bytes` for delivery. Returns `false` if rejected (oversized,
    /// empty, or the outbound buffer is at the high watermark).
    fn write(&self, bytes: &[u8]) -> bool;

    /// Idempotently tear down the connection.
    fn close(&self);

    fn key(&self) -> NetKey;
}

/// A registry mapping `NetKey -> Arc<dyn Connection>`.
///
/// Backed by `DashMap` rather than a `Mutex<HashMap>` because connections
/// register and deregister themselves concurrently from many I/O tasks.
#[derive(Default)]
pub struct ConnectionOwner {
    conns: DashMap<NetKey, Arc<dyn Connection>>,
}

impl ConnectionOwner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_conn(&self, conn: Arc<dyn Connection>) {
        self.conns.insert(conn.key(), conn);
    }

    /// Removes the connection for `key`. Tolerant of a missing key — a
    /// connection that never finished registering (e.g. a failed connect)
    /// is simply absent.
    pub fn del_conn(&self, key: NetKey) {
        self.conns.remove(&key);
    }

    #[must_use]
    pub fn get_conn(&self, key: NetKey) -> Option<Arc<dyn Connection>> {
        self.conns.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::net::Ipv4Addr;

    struct StubConn {
        key: NetKey,
        closed: Mutex<bool>,
    }

    impl Connection for StubConn {
        fn write(&self, _bytes: &[u8]) -> bool {
            true
        }

        fn close(&self) {
            *self.closed.lock() = true;
        }

        fn key(&self) -> NetKey {
            self.key
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let owner = ConnectionOwner::new();
        let key = NetKey::for_tcp(Ipv4Addr::new(127, 0, 0, 1), 9000, 80);
        let conn: Arc<dyn Connection> = Arc::new(StubConn { key, closed: Mutex::new(false) });
        owner.add_conn(Arc::clone(&conn));
        assert!(owner.get_conn(key).is_some());
        assert_eq!(owner.len(), 1);
    }

    #[test]
    fn del_conn_tolerates_missing_key() {
        let owner = ConnectionOwner::new();
        let key = NetKey::for_tcp(Ipv4Addr::new(127, 0, 0, 1), 9000, 80);
        owner.del_conn(key);
        assert!(owner.is_empty());
    }

    #[test]
    fn del_conn_removes_registered_entry() {
        let owner = ConnectionOwner::new();
        let key = NetKey::for_tcp(Ipv4Addr::new(127, 0, 0, 1), 9001, 80);
        let conn: Arc<dyn Connection> = Arc::new(StubConn { key, closed: Mutex::new(false) });
        owner.add_conn(conn);
        owner.del_conn(key);
        assert!(owner.get_conn(key).is_none());
    }
}
