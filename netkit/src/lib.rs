//! # netkit
//!
//! An asynchronous network transport library exposing two length-prefixed
//! message transports — reliable TCP and reliable-over-UDP KCP — behind a
//! single, msg-id routed event driver.
//!
//! ## Architecture
//!
//! - **`netkit-core`**: runtime-agnostic leaves — `NetKey`, `FramedBuffer`,
//!   wire constants, `NetEvent`/`EventQueue`, typed errors.
//! - **`netkit-transport`**: `TcpConnection`/`KcpConnection` state machines
//!   built on `compio`, plus `ConnectionOwner` and `Package` framing.
//! - **`netkit`** (this crate): `EventDriver`, the msgid routing table, and
//!   the public prelude.
//!
//! ## Data flow
//!
//! Bytes arrive at a socket → the connection's framer extracts complete
//! messages → the connection pushes a `Recv` event (carrying the payload
//! inline as `Bytes`) into the shared `EventQueue` → `EventDriver::run_one`
//! dequeues one event, unwraps its `Package` header, looks up the msgid in
//! the routing table, decodes the payload via the registered `Decode` impl,
//! and invokes the application's handler. Lifecycle events (Accept/Connect/
//! Disconnect/Error) bypass decoding and go straight to their handlers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use netkit::prelude::*;
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! struct Ping(u8);
//!
//! impl Decode for Ping {
//!     fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
//!         payload.first().copied().map(Ping).ok_or_else(|| DecodeError::new("empty"))
//!     }
//! }
//!
//! # #[compio::main]
//! # async fn main() {
//! let events = Arc::new(EventQueue::new());
//! let owner = Arc::new(ConnectionOwner::new());
//! let mut driver = EventDriver::new(Arc::clone(&events));
//!
//! driver.add_router::<Ping>(1, |key, msg| {
//!     println!("ping {} from {key}", msg.0);
//! });
//!
//! let conn = TcpConnection::connect(
//!     Ipv4Addr::new(127, 0, 0, 1), 9000, 0, 3, owner, events,
//! ).await;
//! let _ = conn;
//!
//! while driver.run_one() {}
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::future_not_send)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod decode;

/// Development helpers (benches/tests).
pub mod dev_tracing;
pub mod driver;

pub use decode::{Decode, DecodeError};
pub use driver::EventDriver;

pub use netkit_core::buffer::FramedBuffer;
pub use netkit_core::config::{AN_MSG_MAX_SIZE, KCP_UPDATE_INTERVAL, SEND_HIGH_WATERMARK};
pub use netkit_core::error::{ErrorKind, NetError, Result as NetResult};
pub use netkit_core::event::{EventQueue, NetEvent};
pub use netkit_core::key::NetKey;
pub use netkit_transport::{Connection, ConnectionOwner, KcpConnection, Package, TcpConnection};

/// Prelude module for convenient imports.
///
/// ```rust
/// use netkit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Connection, ConnectionOwner, Decode, DecodeError, ErrorKind, EventDriver, EventQueue,
        FramedBuffer, KcpConnection, NetError, NetEvent, NetKey, NetResult, Package, TcpConnection,
    };
    pub use bytes::Bytes;
}
