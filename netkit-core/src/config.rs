//! Wire constants and tunables shared by the TCP and KCP transports.

use std::time::Duration;

/// Maximum payload size for a single application message, on either transport.
///
/// Chosen to comfortably fit in the 16-bit TCP length prefix while leaving
/// headroom below `u16::MAX`.
pub const AN_MSG_MAX_SIZE: usize = 16 * 1024;

/// Size of the big-endian length prefix on the TCP wire.
pub const TCP_HEADER_LEN: usize = 2;

/// Minimum size of a `Package` (2-byte msgid + 2-byte flag); anything shorter
/// is malformed.
pub const PACKAGE_HEADER_LEN: usize = 4;

/// Outbound `FramedBuffer` high watermark, in bytes.
///
/// `TcpConnection::write` and `KcpConnection::write` refuse new writes once
/// buffered (but not yet detached/flushed) bytes reach this size, resolving
/// the open question in the original design about unbounded backpressure.
pub const SEND_HIGH_WATERMARK: usize = 8 * AN_MSG_MAX_SIZE;

/// KCP control block `update()` cadence.
pub const KCP_UPDATE_INTERVAL: Duration = Duration::from_millis(10);

/// Size of the UDP receive buffer backing each `KcpConnection`.
///
/// Must be at least large enough for a maximum-size UDP datagram; KCP itself
/// caps usable payload well below this via its own header overhead.
pub const KCP_UDP_RECV_BUF_SIZE: usize = 64 * 1024;
