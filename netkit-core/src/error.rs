//! Error types shared across the transport and driver layers.

use std::io;
use thiserror::Error;

/// Classifies why a lifecycle `Error` event was raised.
///
/// This is the value carried by `NetEvent::Error` and passed to the
/// registered error handler; it intentionally does not carry the underlying
/// `io::Error` (which is not `Clone` and would force the event queue to box
/// every error) — the `tracing` event emitted alongside the close carries
/// the detailed `io::Error` for operators who need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O failure while reading or receiving.
    RecvErr,
    /// I/O failure while writing or sending.
    SendErr,
    /// Dial (connect) failure, after exhausting retries.
    ConnectErr,
    /// No router registered for the decoded msgid, or payload too short to
    /// contain a `Package` header.
    UnknownMsgId,
    /// The registered decoder failed to parse the payload.
    ParseErr,
    /// A peer declared a message whose size exceeds `AN_MSG_MAX_SIZE` — on
    /// TCP, a frame length prefix above the cap; on KCP, a reassembled
    /// payload above the receive buffer.
    PeerOversized,
    /// The operation was cancelled by `close`.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RecvErr => "recv error",
            Self::SendErr => "send error",
            Self::ConnectErr => "connect error",
            Self::UnknownMsgId => "unknown msgid",
            Self::ParseErr => "parse error",
            Self::PeerOversized => "peer oversized",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Typed error surfaced by entry points that are not inherently `bool`-returning
/// (construction, `connect`, the actor run loops).
#[derive(Debug, Error)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("connect failed after exhausting retries: {0}")]
    ConnectExhausted(io::Error),

    #[error("message of {len} bytes exceeds AN_MSG_MAX_SIZE")]
    MessageTooLarge { len: usize },

    #[error("payload of {len} bytes is shorter than the Package header")]
    PackageTooShort { len: usize },

    #[error("connection is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, NetError>;
