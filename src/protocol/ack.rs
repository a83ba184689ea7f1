//! ACK / NACK payloads: run-length encoded lists of datagram sequence numbers.

use bytes::{Buf, BufMut};

use crate::protocol::{
    constants::MAXIMUM_ACK_RANGE_SPAN,
    packet::{DecodeError, EncodeError, RaknetEncodable},
    types::Sequence24,
};

/// Inclusive range of sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    pub start: Sequence24,
    pub end: Sequence24,
}

impl SequenceRange {
    pub fn single(seq: Sequence24) -> Self {
        Self {
            start: seq,
            end: seq,
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Number of sequence numbers covered by this range.
    pub fn len(&self) -> u32 {
        self.start.distance_to(self.end) + 1
    }

    pub fn iter(&self) -> impl Iterator<Item = Sequence24> {
        let start = self.start;
        (0..self.len()).map(move |i| Sequence24::new(start.value().wrapping_add(i)))
    }

    /// Encoded size of this record on the wire.
    pub fn encoded_len(&self) -> usize {
        if self.is_single() { 4 } else { 7 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AckNackPayload {
    pub ranges: Vec<SequenceRange>,
}

impl AckNackPayload {
    /// Collapses sequence numbers into ranges. Input need not be sorted
    /// and may contain duplicates.
    pub fn from_sequences(sequences: impl IntoIterator<Item = Sequence24>) -> Self {
        let mut values: Vec<u32> = sequences.into_iter().map(|s| s.value()).collect();
        values.sort_unstable();
        values.dedup();

        let mut ranges: Vec<SequenceRange> = Vec::new();
        for value in values {
            let seq = Sequence24::new(value);
            match ranges.last_mut() {
                Some(last)
                    if last.end.next() == seq && last.len() < MAXIMUM_ACK_RANGE_SPAN =>
                {
                    last.end = seq;
                }
                _ => ranges.push(SequenceRange::single(seq)),
            }
        }
        Self { ranges }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn sequences(&self) -> impl Iterator<Item = Sequence24> + '_ {
        self.ranges.iter().flat_map(|r| r.iter())
    }

    /// Splits the payload so that every part encodes within `max_len` bytes.
    pub fn chunked(self, max_len: usize) -> Vec<AckNackPayload> {
        let mut out = Vec::new();
        let mut current = AckNackPayload::default();
        // the record count prefix
        let mut size = 2;
        for range in self.ranges {
            if !current.is_empty() && size + range.encoded_len() > max_len {
                out.push(std::mem::take(&mut current));
                size = 2;
            }
            size += range.encoded_len();
            current.ranges.push(range);
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

impl RaknetEncodable for AckNackPayload {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        let count = u16::try_from(self.ranges.len())
            .map_err(|_| EncodeError::PayloadTooLarge(self.ranges.len()))?;
        count.encode_raknet(dst)?;
        for range in &self.ranges {
            range.is_single().encode_raknet(dst)?;
            range.start.encode_raknet(dst)?;
            if !range.is_single() {
                range.end.encode_raknet(dst)?;
            }
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let count = u16::decode_raknet(src)?;
        let mut ranges = Vec::with_capacity(usize::from(count).min(256));
        for _ in 0..count {
            let single = bool::decode_raknet(src)?;
            let start = Sequence24::decode_raknet(src)?;
            let end = if single {
                start
            } else {
                Sequence24::decode_raknet(src)?
            };
            let range = SequenceRange { start, end };
            if range.len() > MAXIMUM_ACK_RANGE_SPAN {
                return Err(DecodeError::AckRangeTooLarge(range.len()));
            }
            ranges.push(range);
        }
        Ok(Self { ranges })
    }
}
