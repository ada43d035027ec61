//! Netkit Core
//!
//! Runtime-agnostic leaves shared by the TCP and KCP transports:
//! - `key`: the 64-bit `NetKey` connection identifier
//! - `buffer`: `FramedBuffer`, the outbound "detached head" byte queue
//! - `config`: wire constants and tunables (`AN_MSG_MAX_SIZE`, watermarks, timers)
//! - `error`: `ErrorKind` and the typed `NetError`
//! - `event`: `NetEvent` and the thread-safe `EventQueue`
//! - `tcp`: protocol-agnostic socket option helpers
//! - `iobuf`: `IoBytes`, the only place this crate allows `unsafe`

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod iobuf;
pub mod key;
pub mod tcp;

pub mod prelude {
    pub use crate::buffer::FramedBuffer;
    pub use crate::config::{AN_MSG_MAX_SIZE, KCP_UPDATE_INTERVAL, SEND_HIGH_WATERMARK};
    pub use crate::error::{ErrorKind, NetError, Result};
    pub use crate::event::{EventQueue, NetEvent};
    pub use crate::iobuf::IoBytes;
    pub use crate::key::NetKey;
}
