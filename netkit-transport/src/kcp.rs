//! `KcpConnection`: a length-bounded reliable channel layered over UDP.
//!
//! Unlike `TcpConnection`, there is only one lock (`kcp`) because the `kcp`
//! crate's control block is not internally synchronized: `input`, `send`,
//! `recv`, and `update` must never run concurrently. The control block is
//! `None` once the connection is closed, which doubles as the idempotent-close
//! flag (see `close`).

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bytes::Bytes;
use compio::buf::BufResult;
use compio::net::UdpSocket;
use kcp::{Error as KcpError, Kcp};
use parking_lot::Mutex;
use tracing::{trace, warn};

use netkit_core::config::{AN_MSG_MAX_SIZE, KCP_UDP_RECV_BUF_SIZE, KCP_UPDATE_INTERVAL};
use netkit_core::error::ErrorKind;
use netkit_core::event::EventQueue;
use netkit_core::key::NetKey;

use crate::owner::{Connection, ConnectionOwner};

/// Writes a KCP-generated segment to the wire synchronously. KCP invokes this
/// zero or more times per `update`/`flush` call, always from inside a single
/// `kcp`-locked call site, so a blocking `send_to` syscall here is cheap
/// enough not to be worth routing through the async reactor.
struct KcpOutput {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl io::Write for KcpOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        sync_send_to(&self.socket, buf, self.remote)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sends one datagram without going through the async reactor, by borrowing
/// the socket's raw descriptor for the duration of a single syscall. Mirrors
/// `netkit_core::tcp::enable_tcp_nodelay`'s borrow-via-`socket2`-then-forget
/// pattern, which exists for exactly this reason: avoid closing a descriptor
/// still owned by the `compio::net::UdpSocket`.
#[allow(unsafe_code)]
fn sync_send_to(socket: &UdpSocket, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = socket.as_raw_fd();
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        let result = sock.send_to(buf, &addr.into());
        std::mem::forget(sock);
        result
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = socket.as_raw_socket();
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        let result = sock.send_to(buf, &addr.into());
        std::mem::forget(sock);
        result
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (socket, buf, addr);
        Err(io::Error::new(io::ErrorKind::Unsupported, "unsupported platform"))
    }
}

/// `-3` in the reference KCP implementation: the next ready fragment is
/// larger than the caller's receive buffer. Our receive buffer is sized to
/// `AN_MSG_MAX_SIZE`, so this only happens when a peer writes a single
/// message larger than our cap — unrecoverable, since the oversized fragment
/// permanently blocks the head of the receive queue.
fn is_peer_oversized(err: &KcpError) -> bool {
    matches!(err, KcpError::UserBufTooSmall(_))
}

pub struct KcpConnection {
    socket: Arc<UdpSocket>,
    remote_ip: Ipv4Addr,
    remote_port: u16,
    conv: u32,
    kcp: Mutex<Option<Kcp<KcpOutput>>>,
    key_cache: AtomicU64,
    owner: Mutex<Option<Weak<ConnectionOwner>>>,
    events: Arc<EventQueue>,
    start: Instant,
}

impl KcpConnection {
    #[must_use]
    pub fn new(
        socket: Arc<UdpSocket>,
        remote_ip: Ipv4Addr,
        remote_port: u16,
        conv: u32,
        events: Arc<EventQueue>,
    ) -> Arc<Self> {
        let remote = SocketAddr::new(remote_ip.into(), remote_port);
        let output = KcpOutput { socket: Arc::clone(&socket), remote };
        let mut kcp = Kcp::new(conv, output);
        // "fast mode" knobs: nodelay on, 10ms internal tick, 2 resend triggers
        // a retransmit, no-congestion-control — matching the update cadence
        // this connection's timer loop actually runs at.
        kcp.set_nodelay(true, KCP_UPDATE_INTERVAL.as_millis() as i32, 2, true);

        Arc::new(Self {
            socket,
            remote_ip,
            remote_port,
            conv,
            kcp: Mutex::new(Some(kcp)),
            key_cache: AtomicU64::new(0),
            owner: Mutex::new(None),
            events,
            start: Instant::now(),
        })
    }

    pub fn set_owner(&self, owner: &Arc<ConnectionOwner>) {
        *self.owner.lock() = Some(Arc::downgrade(owner));
    }

    #[must_use]
    pub fn key(&self) -> NetKey {
        let cached = self.key_cache.load(Ordering::Acquire);
        if cached != 0 {
            return NetKey::from_u64(cached);
        }
        let key = NetKey::for_kcp(self.remote_ip, self.remote_port, self.conv);
        self.key_cache.store(key.as_u64(), Ordering::Release);
        key
    }

    /// Begins the periodic update timer and the UDP receive loop. Call once,
    /// after registering with the owner.
    pub fn start(self: &Arc<Self>) {
        self.spawn_update_loop();
        self.spawn_recv_loop();
    }

    fn spawn_update_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            loop {
                compio::time::sleep(KCP_UPDATE_INTERVAL).await;
                let now_ms = this.start.elapsed().as_millis() as u32;
                let mut guard = this.kcp.lock();
                let Some(kcp) = guard.as_mut() else {
                    return;
                };
                if let Err(e) = kcp.update(now_ms) {
                    warn!(?e, "kcp update failed");
                    drop(guard);
                    this.close();
                    return;
                }
            }
        })
        .detach();
    }

    fn spawn_recv_loop(self: &Arc<Self>) {
        let this = Arc::clone(self);
        compio::runtime::spawn(async move {
            this.recv_loop().await;
        })
        .detach();
    }

    async fn recv_loop(self: Arc<Self>) {
        loop {
            let buf = vec![0u8; KCP_UDP_RECV_BUF_SIZE];
            let BufResult(result, buf) = self.socket.recv_from(buf).await;
            let n = match result {
                Ok((n, _from)) => n,
                Err(_) => {
                    if self.kcp.lock().is_none() {
                        return;
                    }
                    self.events.push_error(self.key(), ErrorKind::RecvErr);
                    self.close();
                    return;
                }
            };

            let mut guard = self.kcp.lock();
            let Some(kcp) = guard.as_mut() else {
                return;
            };
            if let Err(e) = kcp.input(&buf[..n]) {
                trace!(?e, "kcp rejected inbound datagram");
                continue;
            }

            let mut out = vec![0u8; AN_MSG_MAX_SIZE];
            match kcp.recv(&mut out) {
                Ok(len) => {
                    drop(guard);
                    self.events.push_recv(self.key(), Bytes::copy_from_slice(&out[..len]));
                }
                Err(ref e) if is_peer_oversized(e) => {
                    drop(guard);
                    self.close();
                    return;
                }
                Err(_) => {
                    // RecvQueueEmpty / ExpectingFragment: nothing complete yet.
                }
            }
        }
    }
}

impl Connection for KcpConnection {
    fn write(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() || bytes.len() > AN_MSG_MAX_SIZE {
            return false;
        }
        let mut guard = self.kcp.lock();
        let Some(kcp) = guard.as_mut() else {
            return false;
        };
        kcp.send(bytes).is_ok()
    }

    /// Releases the control block if it's still live; a second call on an
    /// already-closed connection is a no-op. This resolves, in the direction
    /// the design intends, the inverted-looking guard around releasing the
    /// control block in the source this was ported from: release happens
    /// exactly once, on the call that finds it still present.
    fn close(&self) {
        let was_live = {
            let mut guard = self.kcp.lock();
            guard.take().is_some()
        };
        if !was_live {
            return;
        }
        let key = self.key();
        if let Some(owner) = self.owner.lock().take().and_then(|w| w.upgrade()) {
            owner.del_conn(key);
        }
        self.events.push_disconnect(key, self.remote_ip, self.remote_port);
        self.key_cache.store(0, Ordering::Release);
    }

    fn key(&self) -> NetKey {
        Self::key(self)
    }
}
