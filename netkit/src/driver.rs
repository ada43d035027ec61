//! `EventDriver`: demultiplexes one `NetEvent` at a time to typed handlers.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::trace;

use netkit_core::error::ErrorKind;
use netkit_core::event::{EventQueue, NetEvent};
use netkit_core::key::NetKey;
use netkit_transport::package::Package;

use crate::decode::{Decode, DecodeError};

type LifecycleHandler = Box<dyn FnMut(NetKey, Ipv4Addr, u16)>;
type ErrorHandler = Box<dyn FnMut(NetKey, ErrorKind)>;
type RouterEntry = Box<dyn FnMut(NetKey, &[u8]) -> Result<(), DecodeError>>;

/// Consumes one `NetEvent` per `run_one` call, routing `Recv` payloads
/// through a msgid-keyed table of decoder+handler pairs and dispatching
/// lifecycle events to their registered handlers.
///
/// Not thread-safe with respect to itself: the application calls `run_one`
/// from a single dedicated thread. Handlers run inline, off any I/O thread.
pub struct EventDriver {
    events: Arc<EventQueue>,
    routers: HashMap<u16, RouterEntry>,
    on_accept: Option<LifecycleHandler>,
    on_connect: Option<LifecycleHandler>,
    on_disconnect: Option<LifecycleHandler>,
    on_error: Option<ErrorHandler>,
}

impl EventDriver {
    #[must_use]
    pub fn new(events: Arc<EventQueue>) -> Self {
        Self {
            events,
            routers: HashMap::new(),
            on_accept: None,
            on_connect: None,
            on_disconnect: None,
            on_error: None,
        }
    }

    /// Registers a decoder+handler pair for `msgid`. `M::decode` runs against
    /// the `Package`'s payload (header already stripped) before `handler` is
    /// invoked.
    pub fn add_router<M>(&mut self, msgid: u16, mut handler: impl FnMut(NetKey, M) + 'static)
    where
        M: Decode,
    {
        self.routers.insert(
            msgid,
            Box::new(move |key, body| {
                let msg = M::decode(body)?;
                handler(key, msg);
                Ok(())
            }),
        );
    }

    pub fn register_accept_handler(&mut self, handler: impl FnMut(NetKey, Ipv4Addr, u16) + 'static) {
        self.on_accept = Some(Box::new(handler));
    }

    pub fn register_connect_handler(&mut self, handler: impl FnMut(NetKey, Ipv4Addr, u16) + 'static) {
        self.on_connect = Some(Box::new(handler));
    }

    pub fn register_disconnect_handler(&mut self, handler: impl FnMut(NetKey, Ipv4Addr, u16) + 'static) {
        self.on_disconnect = Some(Box::new(handler));
    }

    pub fn register_error_handler(&mut self, handler: impl FnMut(NetKey, ErrorKind) + 'static) {
        self.on_error = Some(Box::new(handler));
    }

    fn emit_error(&mut self, key: NetKey, kind: ErrorKind) {
        if let Some(handler) = self.on_error.as_mut() {
            handler(key, kind);
        }
    }

    /// Pops and dispatches one event. Returns `false` if the queue was empty.
    pub fn run_one(&mut self) -> bool {
        let Some(event) = self.events.pop_one() else {
            return false;
        };

        match event {
            NetEvent::Accept { key, ip, port } => {
                if let Some(handler) = self.on_accept.as_mut() {
                    handler(key, ip, port);
                }
            }
            NetEvent::Connect { key, ip, port } => {
                if let Some(handler) = self.on_connect.as_mut() {
                    handler(key, ip, port);
                }
            }
            NetEvent::Disconnect { key, ip, port } => {
                if let Some(handler) = self.on_disconnect.as_mut() {
                    handler(key, ip, port);
                }
            }
            NetEvent::Error { key, kind } => self.emit_error(key, kind),
            NetEvent::Recv { key, payload } => match Package::unpack(payload) {
                Ok(pkg) => match self.routers.get_mut(&pkg.msgid) {
                    Some(route) => {
                        if route(key, &pkg.payload).is_err() {
                            trace!(%key, msgid = pkg.msgid, "decode failed for routed message");
                            self.emit_error(key, ErrorKind::ParseErr);
                        }
                    }
                    None => {
                        trace!(%key, msgid = pkg.msgid, "no router registered for msgid");
                        self.emit_error(key, ErrorKind::UnknownMsgId);
                    }
                },
                Err(_) => self.emit_error(key, ErrorKind::UnknownMsgId),
            },
        }
        true
    }
}
