//! Per-channel release of ordered and sequenced packets.

use std::collections::HashMap;

use crate::protocol::{
    constants::MAXIMUM_ORDERING_CHANNELS, encapsulated_packet::EncapsulatedPacket,
    packet::DecodeError, types::Sequence24,
};

#[derive(Debug, Default)]
struct OrderingChannel {
    next_index: Sequence24,
    highest_sequence: Option<Sequence24>,
    pending: HashMap<u32, EncapsulatedPacket>,
}

/// Inbound ordering state for all channels of one session. Channels are
/// independent: a gap in one never holds back another.
#[derive(Debug)]
pub struct OrderingChannels {
    channels: Vec<OrderingChannel>,
    max_pending: usize,
}

impl OrderingChannels {
    pub fn new(max_pending: usize) -> Self {
        Self {
            channels: (0..MAXIMUM_ORDERING_CHANNELS)
                .map(|_| OrderingChannel::default())
                .collect(),
            max_pending,
        }
    }

    /// Packets waiting for a lower order index, across all channels.
    pub fn pending_len(&self) -> usize {
        self.channels.iter().map(|c| c.pending.len()).sum()
    }

    /// Accepts one packet and returns everything now releasable, in order.
    /// Packets without ordering pass straight through.
    ///
    /// An ordered packet that has to wait while its channel already holds
    /// `max_pending` packets is refused with
    /// [`DecodeError::OrderingBufferFull`] and leaves the channel untouched.
    pub fn accept(
        &mut self,
        enc: EncapsulatedPacket,
    ) -> Result<Vec<EncapsulatedPacket>, DecodeError> {
        let rel = enc.reliability;
        if !rel.has_ordering() {
            return Ok(vec![enc]);
        }
        let index = enc
            .ordering_index
            .ok_or(DecodeError::MissingField("ordering_index"))?;
        let channel_id = enc
            .ordering_channel
            .ok_or(DecodeError::MissingField("ordering_channel"))?;
        let channel = self
            .channels
            .get_mut(channel_id as usize)
            .ok_or(DecodeError::InvalidOrderingChannel(channel_id))?;

        if rel.is_sequenced() {
            let sequence = enc
                .sequence_index
                .ok_or(DecodeError::MissingField("sequence_index"))?;
            if index < channel.next_index
                || channel.highest_sequence.is_some_and(|h| sequence <= h)
            {
                return Ok(Vec::new());
            }
            channel.highest_sequence = Some(sequence);
            return Ok(vec![enc]);
        }

        if index < channel.next_index {
            // already released
            return Ok(Vec::new());
        }
        if index != channel.next_index {
            if !channel.pending.contains_key(&index.value())
                && channel.pending.len() >= self.max_pending
            {
                return Err(DecodeError::OrderingBufferFull(channel_id));
            }
            channel.pending.insert(index.value(), enc);
            return Ok(Vec::new());
        }

        let mut out = vec![enc];
        channel.next_index = channel.next_index.next();
        while let Some(next) = channel.pending.remove(&channel.next_index.value()) {
            out.push(next);
            channel.next_index = channel.next_index.next();
        }
        channel.highest_sequence = None;
        Ok(out)
    }
}

/// Outbound counters for ordered and sequenced sends on every channel.
#[derive(Debug)]
pub struct OrderingWriter {
    order_write: Vec<Sequence24>,
    sequence_write: Vec<Sequence24>,
}

impl Default for OrderingWriter {
    fn default() -> Self {
        let channels = MAXIMUM_ORDERING_CHANNELS as usize;
        Self {
            order_write: vec![Sequence24::ZERO; channels],
            sequence_write: vec![Sequence24::ZERO; channels],
        }
    }
}

impl OrderingWriter {
    /// Returns the (ordering index, sequence index) to stamp on a packet.
    pub fn assign(
        &mut self,
        channel: u8,
        ordered: bool,
        sequenced: bool,
    ) -> Option<(Sequence24, Option<Sequence24>)> {
        let slot = channel as usize;
        if slot >= self.order_write.len() {
            return None;
        }
        if ordered {
            self.sequence_write[slot] = Sequence24::ZERO;
            return Some((self.order_write[slot].fetch_next(), None));
        }
        if sequenced {
            let sequence = self.sequence_write[slot].fetch_next();
            return Some((self.order_write[slot], Some(sequence)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::reliability::Reliability;
    use bytes::Bytes;

    fn ordered(index: u32, channel: u8) -> EncapsulatedPacket {
        EncapsulatedPacket {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(Sequence24::new(index)),
            sequence_index: None,
            ordering_index: Some(Sequence24::new(index)),
            ordering_channel: Some(channel),
            split: None,
            payload: Bytes::from(vec![index as u8]),
        }
    }

    fn sequenced(order: u32, sequence: u32) -> EncapsulatedPacket {
        EncapsulatedPacket {
            reliability: Reliability::UnreliableSequenced,
            reliable_index: None,
            sequence_index: Some(Sequence24::new(sequence)),
            ordering_index: Some(Sequence24::new(order)),
            ordering_channel: Some(0),
            split: None,
            payload: Bytes::from(vec![sequence as u8]),
        }
    }

    fn payloads(pkts: Vec<EncapsulatedPacket>) -> Vec<u8> {
        pkts.into_iter().map(|p| p.payload[0]).collect()
    }

    #[test]
    fn holds_until_gap_closes() {
        let mut ch = OrderingChannels::new(16);
        assert_eq!(payloads(ch.accept(ordered(0, 0)).unwrap()), vec![0]);
        assert!(ch.accept(ordered(2, 0)).unwrap().is_empty());
        assert_eq!(ch.pending_len(), 1);
        assert_eq!(payloads(ch.accept(ordered(1, 0)).unwrap()), vec![1, 2]);
        assert_eq!(ch.pending_len(), 0);
    }

    #[test]
    fn channels_are_independent() {
        let mut ch = OrderingChannels::new(16);
        assert!(ch.accept(ordered(1, 0)).unwrap().is_empty());
        assert_eq!(payloads(ch.accept(ordered(0, 5)).unwrap()), vec![0]);
    }

    #[test]
    fn old_and_invalid_indices() {
        let mut ch = OrderingChannels::new(16);
        ch.accept(ordered(0, 0)).unwrap();
        assert!(ch.accept(ordered(0, 0)).unwrap().is_empty());
        assert_eq!(
            ch.accept(ordered(0, MAXIMUM_ORDERING_CHANNELS)),
            Err(DecodeError::InvalidOrderingChannel(MAXIMUM_ORDERING_CHANNELS))
        );
    }

    #[test]
    fn full_buffer_refuses_without_losing_state() {
        let mut ch = OrderingChannels::new(2);
        ch.accept(ordered(1, 0)).unwrap();
        ch.accept(ordered(2, 0)).unwrap();
        assert_eq!(
            ch.accept(ordered(3, 0)),
            Err(DecodeError::OrderingBufferFull(0))
        );
        // a retransmission of a held index is not an overflow
        assert!(ch.accept(ordered(2, 0)).unwrap().is_empty());
        assert_eq!(ch.pending_len(), 2);
        // the release path never needs room
        assert_eq!(payloads(ch.accept(ordered(0, 0)).unwrap()), vec![0, 1, 2]);
        assert_eq!(ch.pending_len(), 0);
    }

    #[test]
    fn sequenced_drops_stale() {
        let mut ch = OrderingChannels::new(16);
        assert_eq!(payloads(ch.accept(sequenced(0, 1)).unwrap()), vec![1]);
        assert!(ch.accept(sequenced(0, 0)).unwrap().is_empty());
        assert_eq!(payloads(ch.accept(sequenced(0, 3)).unwrap()), vec![3]);
        assert!(ch.accept(sequenced(0, 3)).unwrap().is_empty());
    }

    #[test]
    fn unordered_passes_through() {
        let mut ch = OrderingChannels::new(16);
        let pkt = EncapsulatedPacket::unreliable(Bytes::from_static(b"x"));
        assert_eq!(ch.accept(pkt.clone()).unwrap(), vec![pkt]);
    }

    #[test]
    fn writer_assigns_indices() {
        let mut w = OrderingWriter::default();
        assert_eq!(w.assign(0, true, false), Some((Sequence24::new(0), None)));
        assert_eq!(w.assign(0, true, false), Some((Sequence24::new(1), None)));
        assert_eq!(
            w.assign(0, false, true),
            Some((Sequence24::new(2), Some(Sequence24::new(0))))
        );
        assert_eq!(
            w.assign(0, false, true),
            Some((Sequence24::new(2), Some(Sequence24::new(1))))
        );
        assert_eq!(w.assign(1, true, false), Some((Sequence24::new(0), None)));
        assert_eq!(w.assign(0, false, false), None);
        assert_eq!(w.assign(200, true, false), None);
    }
}
