use std::time::Instant;

use bytes::Bytes;

use crate::protocol::{
    ack::{AckNackPayload, SequenceRange},
    constants::USER_PACKET_ID_START,
    datagram::Datagram,
    encapsulated_packet::EncapsulatedPacket,
    packet::{ConnectedPacket, DecodeError},
    types::Sequence24,
};

use super::{Receipt, SentDatagram, Session};

/// A fully reassembled, in-order payload released by the reliability layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Connected-mode control traffic (pings, connection requests...).
    Control(ConnectedPacket),
    /// Application data, starting with its ID byte.
    App(Bytes),
}

impl Session {
    /// Handles an incoming data datagram and returns what it released.
    ///
    /// Duplicate datagrams are acknowledged again but produce nothing. An
    /// unreliable packet refused by split reassembly or ordering is dropped
    /// on its own. A reliable one is already acknowledged and recorded as
    /// received, so the peer will never resend it; that refusal comes back
    /// as an error and the session cannot continue.
    pub fn handle_datagram(
        &mut self,
        datagram: Datagram,
        now: Instant,
    ) -> Result<Vec<Delivery>, DecodeError> {
        self.last_activity = now;
        let seq = datagram.sequence();

        let (receipt, gaps) = self.datagram_window.insert_with_gaps(seq);
        match receipt {
            Receipt::OutOfWindow => {
                tracing::debug!(
                    peer = %self.addr,
                    seq = seq.value(),
                    "datagram outside receive window"
                );
                return Ok(Vec::new());
            }
            Receipt::Duplicate => {
                tracing::trace!(peer = %self.addr, seq = seq.value(), "duplicate datagram");
                self.ack_queue.push(seq);
                return Ok(Vec::new());
            }
            Receipt::New => {
                self.ack_queue.push(seq);
                self.nack_queue.retain(|s| *s != seq);
                self.nack_queue.extend(gaps);
            }
        }

        tracing::trace!(
            peer = %self.addr,
            seq = seq.value(),
            packets = datagram.packets.len(),
            "datagram"
        );
        let mut out = Vec::new();
        for enc in datagram.packets {
            self.handle_encapsulated(enc, now, &mut out)?;
        }
        Ok(out)
    }

    fn handle_encapsulated(
        &mut self,
        enc: EncapsulatedPacket,
        now: Instant,
        out: &mut Vec<Delivery>,
    ) -> Result<(), DecodeError> {
        let reliable = enc.reliability.is_reliable();
        if reliable {
            let Some(index) = enc.reliable_index else {
                return Ok(());
            };
            if self.reliable_window.insert(index) != Receipt::New {
                tracing::trace!(
                    peer = %self.addr,
                    index = index.value(),
                    "duplicate reliable packet"
                );
                return Ok(());
            }
        }

        let accepted = match self.splits.add(enc, now) {
            Ok(Some(enc)) => self.ordering.accept(enc),
            Ok(None) => return Ok(()),
            Err(e) => Err(e),
        };
        let released = match accepted {
            Ok(released) => released,
            Err(e) if reliable => return Err(e),
            Err(e) => {
                tracing::debug!(peer = %self.addr, error = %e, "dropping unreliable packet");
                return Ok(());
            }
        };

        for enc in released {
            if let Some(delivery) = self.classify(enc.payload) {
                out.push(delivery);
            }
        }
        Ok(())
    }

    fn classify(&self, payload: Bytes) -> Option<Delivery> {
        let id = *payload.first()?;
        if id >= USER_PACKET_ID_START {
            return Some(Delivery::App(payload));
        }
        match ConnectedPacket::decode(&mut payload.clone()) {
            Ok(packet) => Some(Delivery::Control(packet)),
            Err(e) => {
                tracing::debug!(peer = %self.addr, id, error = %e, "undecodable control packet");
                None
            }
        }
    }

    /// Retires every tracked datagram the peer acknowledged.
    pub fn handle_ack(&mut self, payload: &AckNackPayload, now: Instant) {
        self.last_activity = now;
        for range in &payload.ranges {
            let retired = self.take_sent(*range).len();
            tracing::trace!(peer = %self.addr, start = range.start.value(), retired, "ack");
        }
    }

    /// Puts the packets of every NACKed datagram back at the head of the
    /// send queue; they go out again with a fresh sequence number.
    pub fn handle_nack(&mut self, payload: &AckNackPayload, now: Instant) {
        self.last_activity = now;
        for range in &payload.ranges {
            for sent in self.take_sent(*range) {
                tracing::trace!(peer = %self.addr, packets = sent.packets.len(), "nack resend");
                self.requeue(sent.packets);
            }
        }
    }

    pub(super) fn requeue(&mut self, packets: Vec<EncapsulatedPacket>) {
        for pkt in packets.into_iter().rev() {
            self.outbound.push_front(pkt);
        }
    }

    /// Removes tracked datagrams inside `range`. Walks whichever is smaller,
    /// the range or the table, so a huge range costs no more than the table.
    fn take_sent(&mut self, range: SequenceRange) -> Vec<SentDatagram> {
        if range.len() as usize <= self.sent.len() {
            return range
                .iter()
                .filter_map(|seq| self.sent.remove(&seq.value()))
                .collect();
        }
        let keys: Vec<u32> = self
            .sent
            .keys()
            .copied()
            .filter(|k| range.start.distance_to(Sequence24::new(*k)) < range.len())
            .collect();
        keys.iter().filter_map(|k| self.sent.remove(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::protocol::{
        encapsulated_packet::SplitInfo,
        packet::{ConnectedPing, DisconnectionNotification},
        reliability::Reliability,
        types::RaknetTime,
    };
    use bytes::BytesMut;

    fn session_with(config: &ServerConfig) -> Session {
        Session::new("10.0.0.1:5000".parse().unwrap(), 42, 1400, config, Instant::now())
    }

    fn session() -> Session {
        session_with(&ServerConfig::default())
    }

    fn reliable_ordered(reliable: u32, order: u32, payload: &'static [u8]) -> EncapsulatedPacket {
        EncapsulatedPacket {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(Sequence24::new(reliable)),
            sequence_index: None,
            ordering_index: Some(Sequence24::new(order)),
            ordering_channel: Some(0),
            split: None,
            payload: Bytes::from_static(payload),
        }
    }

    fn fragment(reliable: u32, id: u16, index: u32, data: &'static [u8]) -> EncapsulatedPacket {
        EncapsulatedPacket {
            split: Some(SplitInfo {
                count: 2,
                id,
                index,
            }),
            ..reliable_ordered(reliable, u32::from(id), data)
        }
    }

    fn datagram(seq: u32, packets: Vec<EncapsulatedPacket>) -> Datagram {
        Datagram::new(Sequence24::new(seq), packets)
    }

    fn feed(s: &mut Session, seq: u32, packets: Vec<EncapsulatedPacket>) -> Vec<Delivery> {
        s.handle_datagram(datagram(seq, packets), Instant::now()).unwrap()
    }

    fn app(bytes: &'static [u8]) -> Delivery {
        Delivery::App(Bytes::from_static(bytes))
    }

    #[test]
    fn delivers_in_order_across_datagrams() {
        let mut s = session();
        let out = feed(&mut s, 0, vec![reliable_ordered(0, 0, b"\x80a")]);
        assert_eq!(out, vec![app(b"\x80a")]);
        assert!(feed(&mut s, 1, vec![reliable_ordered(2, 2, b"\x80c")]).is_empty());
        let out = feed(&mut s, 2, vec![reliable_ordered(1, 1, b"\x80b")]);
        assert_eq!(out, vec![app(b"\x80b"), app(b"\x80c")]);
        assert_eq!(s.pending_acks(), 3);
        assert_eq!(s.receive_watermark(), Sequence24::new(3));
    }

    #[test]
    fn retransmitted_reliable_is_not_redelivered() {
        let mut s = session();
        let pkt = EncapsulatedPacket {
            reliability: Reliability::Reliable,
            reliable_index: Some(Sequence24::new(0)),
            sequence_index: None,
            ordering_index: None,
            ordering_channel: None,
            split: None,
            payload: Bytes::from_static(b"\x90"),
        };
        assert_eq!(feed(&mut s, 0, vec![pkt.clone()]).len(), 1);
        // resent under a new datagram number
        assert!(feed(&mut s, 1, vec![pkt]).is_empty());
        assert_eq!(s.pending_acks(), 2);
    }

    #[test]
    fn duplicate_datagram_is_acked_again() {
        let mut s = session();
        let pkt = EncapsulatedPacket::unreliable(Bytes::from_static(b"\x80"));
        assert_eq!(feed(&mut s, 0, vec![pkt.clone()]).len(), 1);
        assert!(feed(&mut s, 0, vec![pkt]).is_empty());
        assert_eq!(s.pending_acks(), 2);
    }

    #[test]
    fn gaps_become_nacks_until_filled() {
        let mut s = session();
        let unreliable = || vec![EncapsulatedPacket::unreliable(Bytes::from_static(b"\x80"))];
        feed(&mut s, 0, unreliable());
        feed(&mut s, 3, unreliable());
        assert_eq!(s.nack_queue, vec![Sequence24::new(1), Sequence24::new(2)]);
        feed(&mut s, 2, unreliable());
        assert_eq!(s.nack_queue, vec![Sequence24::new(1)]);
    }

    #[test]
    fn reassembles_split_then_orders() {
        let mut s = session();
        assert!(feed(&mut s, 0, vec![fragment(1, 0, 1, b"lo")]).is_empty());
        assert_eq!(s.split_assemblies(), 1);
        let out = feed(&mut s, 1, vec![fragment(0, 0, 0, b"\x80hel")]);
        assert_eq!(out, vec![app(b"\x80hello")]);
        assert_eq!(s.split_assemblies(), 0);
    }

    #[test]
    fn ordering_overflow_on_reliable_packet_is_fatal() {
        let config = ServerConfig {
            max_ordered_pending: 2,
            ..Default::default()
        };
        let mut s = session_with(&config);
        // order index 0 never arrives
        assert!(feed(&mut s, 1, vec![reliable_ordered(1, 1, b"\x80b")]).is_empty());
        assert!(feed(&mut s, 2, vec![reliable_ordered(2, 2, b"\x80c")]).is_empty());
        assert_eq!(
            s.handle_datagram(datagram(3, vec![reliable_ordered(3, 3, b"\x80d")]), Instant::now()),
            Err(DecodeError::OrderingBufferFull(0))
        );
    }

    #[test]
    fn split_cap_on_reliable_fragment_is_fatal() {
        let config = ServerConfig {
            max_split_assemblies: 1,
            ..Default::default()
        };
        let mut s = session_with(&config);
        assert!(feed(&mut s, 0, vec![fragment(0, 1, 0, b"\x80a")]).is_empty());
        assert_eq!(
            s.handle_datagram(datagram(1, vec![fragment(1, 2, 0, b"\x80b")]), Instant::now()),
            Err(DecodeError::TooManySplitAssemblies(1))
        );
    }

    #[test]
    fn refused_unreliable_fragment_is_only_dropped() {
        let config = ServerConfig {
            max_split_assemblies: 1,
            ..Default::default()
        };
        let mut s = session_with(&config);
        feed(&mut s, 0, vec![fragment(0, 0, 0, b"\x80a")]);
        let unreliable = EncapsulatedPacket {
            reliability: Reliability::Unreliable,
            reliable_index: None,
            ordering_index: None,
            ordering_channel: None,
            ..fragment(0, 2, 0, b"\x80b")
        };
        assert!(feed(&mut s, 1, vec![unreliable]).is_empty());
        assert_eq!(s.split_assemblies(), 1);
        // the held split still completes
        assert_eq!(
            feed(&mut s, 2, vec![fragment(1, 0, 1, b"z")]),
            vec![app(b"\x80az")]
        );
    }

    #[test]
    fn decodes_control_packets() {
        let mut s = session();
        let mut buf = BytesMut::new();
        ConnectedPacket::from(ConnectedPing {
            ping_time: RaknetTime(7),
        })
        .encode(&mut buf)
        .unwrap();
        let mut pkt = EncapsulatedPacket::unreliable(buf.freeze());
        let mut disconnect = BytesMut::new();
        ConnectedPacket::from(DisconnectionNotification)
            .encode(&mut disconnect)
            .unwrap();
        let ping = ConnectedPing {
            ping_time: RaknetTime(7),
        };
        assert_eq!(
            feed(&mut s, 0, vec![pkt.clone()]),
            vec![Delivery::Control(ping.into())]
        );

        pkt.payload = disconnect.freeze();
        assert_eq!(
            feed(&mut s, 1, vec![pkt]),
            vec![Delivery::Control(DisconnectionNotification.into())]
        );
    }

    #[test]
    fn unknown_control_id_is_dropped() {
        let mut s = session();
        let pkt = EncapsulatedPacket::unreliable(Bytes::from_static(b"\x7f\x01"));
        assert!(feed(&mut s, 0, vec![pkt]).is_empty());
    }
}
