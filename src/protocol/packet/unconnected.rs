//! Unconnected (offline) RakNet discovery and ping packets.

use bytes::{Buf, BufMut};

use crate::protocol::{
    packet::{DecodeError, EncodeError, Packet, RaknetEncodable},
    types::{Advertisement, RaknetTime, read_magic, write_magic},
};

/// Unconnected ping used by clients to discover RakNet servers.
#[derive(Debug, Clone)]
pub struct UnconnectedPing {
    pub ping_time: RaknetTime,
    pub client_guid: u64,
}

impl Packet for UnconnectedPing {
    const ID: u8 = 0x01;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.ping_time.encode_raknet(dst)?;
        write_magic(dst)?;
        self.client_guid.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let ping_time = RaknetTime::decode_raknet(src)?;
        read_magic(src)?;
        // Some clients omit the trailing guid.
        let client_guid = if src.remaining() >= 8 {
            u64::decode_raknet(src)?
        } else {
            0
        };
        Ok(Self {
            ping_time,
            client_guid,
        })
    }
}

/// Ping that only expects a pong while the server has free slots.
#[derive(Debug, Clone)]
pub struct UnconnectedPingOpenConnections {
    pub ping: UnconnectedPing,
}

impl Packet for UnconnectedPingOpenConnections {
    const ID: u8 = 0x02;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.ping.encode_body(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            ping: UnconnectedPing::decode_body(src)?,
        })
    }
}

/// Unconnected pong sent by servers in response to `UnconnectedPing`.
#[derive(Debug, Clone)]
pub struct UnconnectedPong {
    pub ping_time: RaknetTime,
    pub server_guid: u64,
    pub advertisement: Advertisement,
}

impl Packet for UnconnectedPong {
    const ID: u8 = 0x1c;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.ping_time.encode_raknet(dst)?;
        self.server_guid.encode_raknet(dst)?;
        write_magic(dst)?;
        self.advertisement.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let ping_time = RaknetTime::decode_raknet(src)?;
        let server_guid = u64::decode_raknet(src)?;
        read_magic(src)?;
        Ok(Self {
            ping_time,
            server_guid,
            advertisement: Advertisement::decode_raknet(src)?,
        })
    }
}
