//! The pluggable schema codec collaborator.
//!
//! `netkit` treats a `Recv` payload as opaque; turning it into an
//! application type is the job of whatever message-schema library the
//! embedding application already uses (protobuf, a hand-rolled binary
//! format, etc). Implement `Decode` for that type and hand it to
//! `EventDriver::add_router`.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to decode message: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

pub trait Decode: Sized {
    fn decode(payload: &[u8]) -> Result<Self, DecodeError>;
}
