use crate::protocol::{
    packet::{DecodeError, EncodeError, RaknetEncodable},
    reliability::Reliability,
    types::{EncapsulatedPacketHeader, Sequence24},
};
use bytes::{Buf, BufMut, Bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitInfo {
    pub count: u32,
    pub id: u16,
    pub index: u32,
}

/// One reliability-tagged payload unit inside a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedPacket {
    pub reliability: Reliability,
    pub reliable_index: Option<Sequence24>,
    pub sequence_index: Option<Sequence24>,
    pub ordering_index: Option<Sequence24>,
    pub ordering_channel: Option<u8>,
    pub split: Option<SplitInfo>,
    pub payload: Bytes,
}

impl EncapsulatedPacket {
    pub fn unreliable(payload: Bytes) -> Self {
        Self {
            reliability: Reliability::Unreliable,
            reliable_index: None,
            sequence_index: None,
            ordering_index: None,
            ordering_channel: None,
            split: None,
            payload,
        }
    }

    pub fn header(&self) -> EncapsulatedPacketHeader {
        EncapsulatedPacketHeader {
            reliability: self.reliability,
            is_split: self.split.is_some(),
        }
    }

    /// Size of the header fields implied by reliability and split flags.
    pub fn header_len(&self) -> usize {
        let mut len = 1 + 2;
        if self.reliability.is_reliable() {
            len += 3;
        }
        if self.reliability.is_sequenced() {
            len += 3;
        }
        if self.reliability.has_ordering() {
            len += 3 + 1;
        }
        if self.split.is_some() {
            len += 4 + 2 + 4;
        }
        len
    }

    pub fn encoded_len(&self) -> usize {
        self.header_len() + self.payload.len()
    }
}

impl RaknetEncodable for EncapsulatedPacket {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        // 1) flags byte
        self.header().encode_raknet(dst)?;

        // 2) bit length
        let bit_length = u16::try_from(self.payload.len() << 3)
            .map_err(|_| EncodeError::PayloadTooLarge(self.payload.len()))?;
        bit_length.encode_raknet(dst)?;

        // 3) reliability‑dependent indexes
        let rel = self.reliability;
        if rel.is_reliable() {
            self.reliable_index
                .ok_or(EncodeError::MissingField("reliable_index"))?
                .encode_raknet(dst)?;
        }
        if rel.is_sequenced() {
            self.sequence_index
                .ok_or(EncodeError::MissingField("sequence_index"))?
                .encode_raknet(dst)?;
        }
        if rel.has_ordering() {
            self.ordering_index
                .ok_or(EncodeError::MissingField("ordering_index"))?
                .encode_raknet(dst)?;
            self.ordering_channel
                .ok_or(EncodeError::MissingField("ordering_channel"))?
                .encode_raknet(dst)?;
        }

        // 4) split metadata
        if let Some(split) = &self.split {
            split.count.encode_raknet(dst)?;
            split.id.encode_raknet(dst)?;
            split.index.encode_raknet(dst)?;
        }

        // 5) payload
        dst.put_slice(&self.payload);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let header = EncapsulatedPacketHeader::decode_raknet(src)?;

        let bit_length = u16::decode_raknet(src)?;
        let payload_len = ((bit_length as usize) + 7) >> 3;

        let rel = header.reliability;

        let reliable_index = if rel.is_reliable() {
            Some(Sequence24::decode_raknet(src)?)
        } else {
            None
        };

        let sequence_index = if rel.is_sequenced() {
            Some(Sequence24::decode_raknet(src)?)
        } else {
            None
        };

        let (ordering_index, ordering_channel) = if rel.has_ordering() {
            let idx = Sequence24::decode_raknet(src)?;
            let ch = u8::decode_raknet(src)?;
            (Some(idx), Some(ch))
        } else {
            (None, None)
        };

        let split = if header.is_split {
            Some(SplitInfo {
                count: u32::decode_raknet(src)?,
                id: u16::decode_raknet(src)?,
                index: u32::decode_raknet(src)?,
            })
        } else {
            None
        };

        if src.remaining() < payload_len {
            return Err(DecodeError::UnexpectedEof);
        }
        let payload = src.copy_to_bytes(payload_len);

        Ok(EncapsulatedPacket {
            reliability: rel,
            reliable_index,
            sequence_index,
            ordering_index,
            ordering_channel,
            split,
            payload,
        })
    }
}
