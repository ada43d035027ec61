//! Application-level unwrapping of an `AN_Msg` payload into `(msgid, flag, body)`.

use bytes::Bytes;
use netkit_core::config::PACKAGE_HEADER_LEN;
use netkit_core::error::NetError;

/// A parsed application message: `msgid:u16-LE | flag:u16-LE | payload:opaque`.
#[derive(Debug, Clone)]
pub struct Package {
    pub msgid: u16,
    pub flag: u16,
    pub payload: Bytes,
}

impl Package {
    /// Unwraps a raw `AN_Msg` payload. Returns an error if shorter than the
    /// 4-byte header (2-byte msgid + 2-byte flag).
    pub fn unpack(raw: Bytes) -> Result<Self, NetError> {
        if raw.len() < PACKAGE_HEADER_LEN {
            return Err(NetError::PackageTooShort { len: raw.len() });
        }
        let msgid = u16::from_le_bytes([raw[0], raw[1]]);
        let flag = u16::from_le_bytes([raw[2], raw[3]]);
        let payload = raw.slice(PACKAGE_HEADER_LEN..);
        Ok(Self { msgid, flag, payload })
    }
}
