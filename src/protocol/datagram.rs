use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::{DatagramFlags, RAKNET_DATAGRAM_HEADER_SIZE},
    encapsulated_packet::EncapsulatedPacket,
    packet::{DecodeError, EncodeError, RaknetEncodable},
    types::{DatagramHeader, Sequence24},
};

/// A numbered frame carrying one or more encapsulated packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub header: DatagramHeader,
    pub packets: Vec<EncapsulatedPacket>,
}

impl Datagram {
    pub fn new(sequence: Sequence24, packets: Vec<EncapsulatedPacket>) -> Self {
        Self {
            header: DatagramHeader {
                flags: DatagramFlags::VALID | DatagramFlags::NEEDS_B_AND_AS,
                sequence,
            },
            packets,
        }
    }

    pub fn sequence(&self) -> Sequence24 {
        self.header.sequence
    }

    pub fn encoded_len(&self) -> usize {
        RAKNET_DATAGRAM_HEADER_SIZE
            + self
                .packets
                .iter()
                .map(EncapsulatedPacket::encoded_len)
                .sum::<usize>()
    }

    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.header.encode(dst)?;
        for pkt in &self.packets {
            pkt.encode_raknet(dst)?;
        }
        Ok(())
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let header = DatagramHeader::decode(src)?;
        let mut packets = Vec::new();
        while src.has_remaining() {
            packets.push(EncapsulatedPacket::decode_raknet(src)?);
        }
        Ok(Self { header, packets })
    }
}
