//! Tokio-based UDP transport for RakNet sessions.
//!
//! - [`PacketSink`] is the socket boundary the session manager writes to.
//! - [`RaknetListener`] / [`RaknetConnection`] run a manager on a tokio
//!   `UdpSocket` and hand out per-peer handles.
//!
//! All RakNet details (fragmentation, reliability, ordering, ACK/NACK)
//! live in the `session` module; this layer only moves bytes and events.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::protocol::reliability::Reliability;

pub mod listener;
mod listener_conn;

pub use listener::RaknetListener;
pub use listener_conn::RaknetConnection;

/// Fire-and-forget datagram output. Implementations must not block.
pub trait PacketSink {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
}

impl PacketSink for tokio::net::UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.try_send_to(buf, target)
    }
}

impl PacketSink for std::net::UdpSocket {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        std::net::UdpSocket::send_to(self, buf, target)
    }
}

impl<T: PacketSink + ?Sized> PacketSink for Arc<T> {
    fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        (**self).send_to(buf, target)
    }
}

/// High-level message object for sending data.
/// Wraps the payload and delivery options (reliability, channel).
#[derive(Debug, Clone)]
pub struct Message {
    pub buffer: Bytes,
    pub reliability: Reliability,
    pub channel: u8,
}

impl Message {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            reliability: Reliability::ReliableOrdered,
            channel: 0,
        }
    }

    pub fn reliability(mut self, reliability: Reliability) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
}

impl From<Bytes> for Message {
    fn from(buffer: Bytes) -> Self {
        Self::new(buffer)
    }
}

impl From<Vec<u8>> for Message {
    fn from(vec: Vec<u8>) -> Self {
        Self::new(vec)
    }
}

impl From<&'static [u8]> for Message {
    fn from(slice: &'static [u8]) -> Self {
        Self::new(Bytes::from(slice))
    }
}

/// Requests from connection handles to the listener task.
#[derive(Debug)]
pub(crate) enum Command {
    Send { peer: SocketAddr, message: Message },
    Disconnect(SocketAddr),
    SetAdvertisement(Bytes),
}
