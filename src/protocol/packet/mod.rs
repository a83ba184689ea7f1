//! Packet bodies and the registries that dispatch on their ID byte.

pub mod connected;
mod error;
pub mod open_connection;
mod registry;
pub mod unconnected;
mod utils;

pub use connected::*;
pub use error::{DecodeError, EncodeError};
pub use open_connection::*;
pub use registry::{ConnectedPacket, OfflinePacket};
pub use unconnected::*;

use bytes::{Buf, BufMut};

/// A packet body identified by a single leading byte.
///
/// Only the body goes through these methods; [`OfflinePacket`] and
/// [`ConnectedPacket`] read and write the ID.
pub trait Packet: Sized {
    const ID: u8;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError>;

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

/// A value with a fixed RakNet wire representation (integers, triads,
/// addresses, magic, headers).
pub trait RaknetEncodable: Sized {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError>;

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError>;
}
