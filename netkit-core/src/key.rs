//! `NetKey`: a 64-bit identifier naming one connection within a process.

use std::net::Ipv4Addr;

/// Sentinel value meaning "not yet bound" — the remote endpoint is not
/// available yet (pre-connect) or no longer available (post-close).
pub const UNBOUND: NetKey = NetKey(0);

/// A 64-bit identifier uniquely naming one connection within a process.
///
/// For TCP connections this is `(remote_ipv4 << 32) | (remote_port << 16) | local_listen_port`.
/// For KCP connections this is `(remote_ipv4 << 32) | (remote_port << 16) | conv_id`.
/// In both encodings the low 16 bits disambiguate otherwise-identical remote
/// endpoints (multiple listeners sharing a peer, or multiple KCP conversations
/// to the same peer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetKey(u64);

impl NetKey {
    /// Build the key used by `TcpConnection`.
    #[must_use]
    pub const fn for_tcp(remote_ip: Ipv4Addr, remote_port: u16, local_listen_port: u16) -> Self {
        let ip_bits = u32::from_be_bytes(remote_ip.octets()) as u64;
        Self((ip_bits << 32) | ((remote_port as u64) << 16) | (local_listen_port as u64))
    }

    /// Build the key used by `KcpConnection`; `conv` is KCP's 32-bit conversation
    /// id, but only the low 16 bits participate in this encoding (see GLOSSARY).
    #[must_use]
    pub const fn for_kcp(remote_ip: Ipv4Addr, remote_port: u16, conv: u32) -> Self {
        let ip_bits = u32::from_be_bytes(remote_ip.octets()) as u64;
        Self((ip_bits << 32) | ((remote_port as u64) << 16) | ((conv as u16) as u64))
    }

    /// The sentinel "not yet bound" key.
    #[must_use]
    pub const fn unbound() -> Self {
        UNBOUND
    }

    #[must_use]
    pub const fn is_unbound(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstructs a `NetKey` from its raw encoding, e.g. from an
    /// `AtomicU64`-backed cache.
    #[must_use]
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<NetKey> for u64 {
    fn from(key: NetKey) -> Self {
        key.0
    }
}

impl std::fmt::Display for NetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
