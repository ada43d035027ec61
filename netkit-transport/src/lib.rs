//! # netkit-transport
//!
//! Connection state machines for netkit's two wire transports, built on
//! `compio`:
//!
//! - **TCP**: `TcpConnection` frames messages with a big-endian 16-bit length
//!   prefix and enforces single-write-in-flight ordering.
//! - **KCP**: `KcpConnection` layers a reliable, ordered channel over UDP
//!   using the `kcp` crate's control block, driven by a 10ms update timer.
//!
//! Both connection types implement the shared `Connection` trait and
//! register themselves with a `ConnectionOwner`. `Package` unwraps the
//! `(msgid, flag, payload)` triple carried inside a frame's payload.
//!
//! This is an internal implementation crate — application code should depend
//! on the `netkit` facade crate, which re-exports what's needed here.

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::future_not_send)] // connection tasks are pinned to one compio executor thread

pub mod kcp;
pub mod owner;
pub mod package;
pub mod tcp;

pub use kcp::KcpConnection;
pub use owner::{Connection, ConnectionOwner};
pub use package::Package;
pub use tcp::TcpConnection;

/// Prelude module for convenient imports
///
/// ```rust
/// use netkit_transport::prelude::*;
/// ```
pub mod prelude {
    pub use super::{Connection, ConnectionOwner, KcpConnection, Package, TcpConnection};
    pub use bytes::Bytes;
}
