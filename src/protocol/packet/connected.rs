//! Control packets exchanged inside an established session.

use std::net::SocketAddr;

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants,
    packet::{DecodeError, EncodeError, Packet, RaknetEncodable},
    types::RaknetTime,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPing {
    pub ping_time: RaknetTime,
}

impl Packet for ConnectedPing {
    const ID: u8 = 0x00;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.ping_time.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            ping_time: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPong {
    pub ping_time: RaknetTime,
    pub pong_time: RaknetTime,
}

impl Packet for ConnectedPong {
    const ID: u8 = 0x03;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.ping_time.encode_raknet(dst)?;
        self.pong_time.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            ping_time: RaknetTime::decode_raknet(src)?,
            pong_time: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub client_guid: u64,
    pub timestamp: RaknetTime,
    pub secure: bool,
}

impl Packet for ConnectionRequest {
    const ID: u8 = 0x09;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.client_guid.encode_raknet(dst)?;
        self.timestamp.encode_raknet(dst)?;
        self.secure.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            client_guid: u64::decode_raknet(src)?,
            timestamp: RaknetTime::decode_raknet(src)?,
            secure: bool::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestAccepted {
    pub address: SocketAddr,
    pub system_index: u16,
    pub system_addresses: [SocketAddr; 10],
    pub request_timestamp: RaknetTime,
    pub accepted_timestamp: RaknetTime,
}

impl Packet for ConnectionRequestAccepted {
    const ID: u8 = 0x10;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.address.encode_raknet(dst)?;
        self.system_index.encode_raknet(dst)?;
        for address in &self.system_addresses {
            address.encode_raknet(dst)?;
        }
        self.request_timestamp.encode_raknet(dst)?;
        self.accepted_timestamp.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let address = SocketAddr::decode_raknet(src)?;
        let system_index = u16::decode_raknet(src)?;
        let system_addresses = decode_system_addresses(src)?;
        Ok(Self {
            address,
            system_index,
            system_addresses,
            request_timestamp: RaknetTime::decode_raknet(src)?,
            accepted_timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncomingConnection {
    pub server_address: SocketAddr,
    /// Clients send 10 or 20 internal addresses depending on their build.
    pub system_addresses: Vec<SocketAddr>,
    pub request_timestamp: RaknetTime,
    pub accepted_timestamp: RaknetTime,
}

impl Packet for NewIncomingConnection {
    const ID: u8 = 0x13;

    fn encode_body(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.server_address.encode_raknet(dst)?;
        for address in &self.system_addresses {
            address.encode_raknet(dst)?;
        }
        self.request_timestamp.encode_raknet(dst)?;
        self.accepted_timestamp.encode_raknet(dst)
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let server_address = SocketAddr::decode_raknet(src)?;
        // Addresses run until only the two timestamps remain.
        let mut system_addresses = Vec::new();
        while src.remaining() > 16 {
            system_addresses.push(SocketAddr::decode_raknet(src)?);
        }
        Ok(Self {
            server_address,
            system_addresses,
            request_timestamp: RaknetTime::decode_raknet(src)?,
            accepted_timestamp: RaknetTime::decode_raknet(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectionNotification;

impl Packet for DisconnectionNotification {
    const ID: u8 = 0x15;

    fn encode_body(&self, _dst: &mut impl BufMut) -> Result<(), EncodeError> {
        Ok(())
    }

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

pub(crate) fn local_system_addresses() -> [SocketAddr; 10] {
    constants::LOCAL_IP_ADDRESSES_V4.map(SocketAddr::V4)
}

fn decode_system_addresses(src: &mut impl Buf) -> Result<[SocketAddr; 10], DecodeError> {
    let mut system_addresses = local_system_addresses();
    for addr in &mut system_addresses {
        *addr = SocketAddr::decode_raknet(src)?;
    }
    Ok(system_addresses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn connection_request_accepted_roundtrip() {
        let pkt = ConnectionRequestAccepted {
            address: "10.1.2.3:4000".parse().unwrap(),
            system_index: 0,
            system_addresses: local_system_addresses(),
            request_timestamp: RaknetTime(10),
            accepted_timestamp: RaknetTime(20),
        };
        let mut buf = BytesMut::new();
        pkt.encode_body(&mut buf).unwrap();
        assert_eq!(buf.len(), 7 + 2 + 7 * 10 + 8 + 8);
        let decoded = ConnectionRequestAccepted::decode_body(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn new_incoming_connection_reads_variable_addresses() {
        let pkt = NewIncomingConnection {
            server_address: "10.1.2.3:19132".parse().unwrap(),
            system_addresses: local_system_addresses().to_vec(),
            request_timestamp: RaknetTime(1),
            accepted_timestamp: RaknetTime(2),
        };
        let mut buf = BytesMut::new();
        pkt.encode_body(&mut buf).unwrap();
        let decoded = NewIncomingConnection::decode_body(&mut buf.clone().freeze()).unwrap();
        assert_eq!(decoded, pkt);

        buf.truncate(buf.len() - 3);
        assert_eq!(
            NewIncomingConnection::decode_body(&mut buf.freeze()),
            Err(DecodeError::UnexpectedEof)
        );
    }
}
