//! Offline handshake packets that negotiate MTU and exchange identities.

use std::net::SocketAddr;

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::OPEN_CONNECTION_MTU_OVERHEAD,
    packet::{DecodeError, EncodeError, Packet, RaknetEncodable},
    types::{EoBPadding, read_magic, write_magic},
};

/// First handshake request. The client pads it to the MTU it is probing,
/// so the MTU is implied by the packet length rather than sent as a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest1 {
    pub protocol_version: u8,
    pub mtu: u16,
}

impl Packet for OpenConnectionRequest1 {
    const ID: u8 = 0x05;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.protocol_version.encode_raknet(dst)?;
        let padding = self.mtu.saturating_sub(OPEN_CONNECTION_MTU_OVERHEAD + 1);
        EoBPadding(padding as usize).encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        let after_magic = u16::try_from(src.remaining()).unwrap_or(u16::MAX);
        let protocol_version = u8::decode_raknet(src)?;
        EoBPadding::decode_raknet(src)?;
        Ok(Self {
            protocol_version,
            mtu: after_magic.saturating_add(OPEN_CONNECTION_MTU_OVERHEAD),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply1 {
    pub server_guid: u64,
    pub mtu: u16,
}

impl Packet for OpenConnectionReply1 {
    const ID: u8 = 0x06;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.server_guid.encode_raknet(dst)?;
        false.encode_raknet(dst)?; // security bool, no cookie
        self.mtu.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        let server_guid = u64::decode_raknet(src)?;
        if bool::decode_raknet(src)? {
            u32::decode_raknet(src)?; // cookie
        }
        Ok(Self {
            server_guid,
            mtu: u16::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionRequest2 {
    pub server_addr: SocketAddr,
    pub mtu: u16,
    pub client_guid: u64,
}

impl Packet for OpenConnectionRequest2 {
    const ID: u8 = 0x07;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.server_addr.encode_raknet(dst)?;
        self.mtu.encode_raknet(dst)?;
        self.client_guid.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        Ok(Self {
            server_addr: SocketAddr::decode_raknet(src)?,
            mtu: u16::decode_raknet(src)?,
            client_guid: u64::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConnectionReply2 {
    pub server_guid: u64,
    pub client_addr: SocketAddr,
    pub mtu: u16,
    pub security: bool,
}

impl Packet for OpenConnectionReply2 {
    const ID: u8 = 0x08;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.server_guid.encode_raknet(dst)?;
        self.client_addr.encode_raknet(dst)?;
        self.mtu.encode_raknet(dst)?;
        self.security.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        Ok(Self {
            server_guid: u64::decode_raknet(src)?,
            client_addr: SocketAddr::decode_raknet(src)?,
            mtu: u16::decode_raknet(src)?,
            security: bool::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleProtocolVersion {
    pub protocol: u8,
    pub server_guid: u64,
}

impl Packet for IncompatibleProtocolVersion {
    const ID: u8 = 0x19;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.protocol.encode_raknet(dst)?;
        write_magic(dst)?;
        self.server_guid.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let protocol = u8::decode_raknet(src)?;
        read_magic(src)?;
        Ok(Self {
            protocol,
            server_guid: u64::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyConnected {
    pub server_guid: u64,
}

impl Packet for AlreadyConnected {
    const ID: u8 = 0x12;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.server_guid.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        Ok(Self {
            server_guid: u64::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoFreeIncomingConnections {
    pub server_guid: u64,
}

impl Packet for NoFreeIncomingConnections {
    const ID: u8 = 0x14;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        write_magic(dst)?;
        self.server_guid.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        read_magic(src)?;
        Ok(Self {
            server_guid: u64::decode_raknet(src)?,
        })
    }
}
