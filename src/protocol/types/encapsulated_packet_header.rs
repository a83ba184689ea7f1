use bytes::{Buf, BufMut};

use crate::protocol::{
    packet::{DecodeError, EncodeError, RaknetEncodable},
    reliability::Reliability,
};

const SPLIT_FLAG: u8 = 0b0001_0000;
const RELIABILITY_SHIFT: u8 = 5;

/// The flags byte leading every encapsulated packet: the top three bits hold
/// the reliability, bit 4 marks a split fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncapsulatedPacketHeader {
    pub reliability: Reliability,
    pub is_split: bool,
}

impl RaknetEncodable for EncapsulatedPacketHeader {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        let mut flags = (self.reliability as u8) << RELIABILITY_SHIFT;
        if self.is_split {
            flags |= SPLIT_FLAG;
        }
        dst.put_u8(flags);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let flags = u8::decode_raknet(src)?;
        Ok(Self {
            reliability: Reliability::try_from(flags >> RELIABILITY_SHIFT)?,
            is_split: flags & SPLIT_FLAG != 0,
        })
    }
}
