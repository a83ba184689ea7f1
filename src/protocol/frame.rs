//! Top-level classification of every inbound UDP payload.

use bytes::{Buf, BufMut};

use crate::protocol::{
    ack::AckNackPayload,
    constants::DatagramFlags,
    datagram::Datagram,
    packet::{DecodeError, EncodeError, OfflinePacket, RaknetEncodable},
};

/// Everything that can arrive on the socket, decided by the first byte:
/// the valid bit marks session traffic, then ACK and NACK bits refine it.
#[derive(Debug, Clone)]
pub enum Frame {
    Offline(OfflinePacket),
    Datagram(Datagram),
    Ack(AckNackPayload),
    Nack(AckNackPayload),
}

impl Frame {
    pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let flags = DatagramFlags::from_bits_truncate(src.chunk()[0]);
        if !flags.contains(DatagramFlags::VALID) {
            return Ok(Frame::Offline(OfflinePacket::decode(src)?));
        }
        if flags.contains(DatagramFlags::ACK) {
            src.advance(1);
            Ok(Frame::Ack(AckNackPayload::decode_raknet(src)?))
        } else if flags.contains(DatagramFlags::NACK) {
            src.advance(1);
            Ok(Frame::Nack(AckNackPayload::decode_raknet(src)?))
        } else {
            Ok(Frame::Datagram(Datagram::decode(src)?))
        }
    }

    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        match self {
            Frame::Offline(packet) => packet.encode(dst),
            Frame::Datagram(datagram) => datagram.encode(dst),
            Frame::Ack(payload) => {
                dst.put_u8((DatagramFlags::VALID | DatagramFlags::ACK).bits());
                payload.encode_raknet(dst)
            }
            Frame::Nack(payload) => {
                dst.put_u8((DatagramFlags::VALID | DatagramFlags::NACK).bits());
                payload.encode_raknet(dst)
            }
        }
    }
}

impl From<OfflinePacket> for Frame {
    fn from(packet: OfflinePacket) -> Self {
        Frame::Offline(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        encapsulated_packet::EncapsulatedPacket, packet::OpenConnectionRequest1, types::Sequence24,
    };
    use bytes::{Bytes, BytesMut};

    fn encode(frame: &Frame) -> Bytes {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        buf.freeze()
    }

    #[test]
    fn classifies_offline_packets() {
        let frame = Frame::from(OfflinePacket::from(OpenConnectionRequest1 {
            protocol_version: 11,
            mtu: 600,
        }));
        let bytes = encode(&frame);
        assert_eq!(bytes[0], 0x05);
        assert!(matches!(
            Frame::decode(&mut bytes.clone()).unwrap(),
            Frame::Offline(OfflinePacket::OpenConnectionRequest1(p)) if p.mtu == 600
        ));
    }

    #[test]
    fn classifies_datagram_ack_and_nack() {
        let datagram = Frame::Datagram(Datagram::new(
            Sequence24::new(3),
            vec![EncapsulatedPacket::unreliable(Bytes::from_static(b"\x86hi"))],
        ));
        let bytes = encode(&datagram);
        assert_eq!(bytes[0], 0x84);
        match Frame::decode(&mut bytes.clone()).unwrap() {
            Frame::Datagram(d) => {
                assert_eq!(d.sequence().value(), 3);
                assert_eq!(d.packets.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let payload = AckNackPayload::from_sequences([Sequence24::new(1)]);
        let ack = encode(&Frame::Ack(payload.clone()));
        assert_eq!(ack[0], 0xc0);
        assert!(matches!(Frame::decode(&mut ack.clone()).unwrap(), Frame::Ack(p) if p == payload));
        let nack = encode(&Frame::Nack(payload.clone()));
        assert_eq!(nack[0], 0xa0);
        assert!(matches!(
            Frame::decode(&mut nack.clone()).unwrap(),
            Frame::Nack(p) if p == payload
        ));
    }

    #[test]
    fn empty_and_short_inputs_fail() {
        assert_eq!(
            Frame::decode(&mut Bytes::new()).unwrap_err(),
            DecodeError::UnexpectedEof
        );
        assert_eq!(
            Frame::decode(&mut Bytes::from_static(&[0x84, 0x00])).unwrap_err(),
            DecodeError::UnexpectedEof
        );
    }
}
