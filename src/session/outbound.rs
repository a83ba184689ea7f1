use std::time::{Duration, Instant};

use crate::protocol::{
    ack::AckNackPayload, constants::RAKNET_DATAGRAM_HEADER_SIZE, datagram::Datagram,
    encapsulated_packet::EncapsulatedPacket, frame::Frame,
};

use super::{SentDatagram, Session};

impl Session {
    /// Requeues every tracked datagram older than `timeout`. The packets
    /// keep their reliable index so the peer's duplicate filter still works.
    pub fn collect_resends(&mut self, now: Instant, timeout: Duration) -> usize {
        let mut expired: Vec<u32> = self
            .sent
            .iter()
            .filter(|(_, sent)| now.saturating_duration_since(sent.sent_at) >= timeout)
            .map(|(seq, _)| *seq)
            .collect();
        expired.sort_unstable();
        let count = expired.len();
        for seq in expired.into_iter().rev() {
            if let Some(sent) = self.sent.remove(&seq) {
                self.requeue(sent.packets);
            }
        }
        if count > 0 {
            tracing::trace!(peer = %self.addr, count, "resending timed out datagrams");
        }
        count
    }

    /// Drops split assemblies that have waited longer than `timeout`.
    pub fn expire_splits(&mut self, now: Instant, timeout: Duration) -> usize {
        let expired = self.splits.expire(now, timeout);
        if expired > 0 {
            tracing::debug!(peer = %self.addr, expired, "dropped incomplete split packets");
        }
        expired
    }

    /// Drains the pending ACK and NACK queues into frames that each fit a
    /// datagram.
    pub fn poll_acks(&mut self) -> Vec<Frame> {
        // minus the flags byte
        let max_len = self.max_datagram_len().saturating_sub(1);
        let mut frames = Vec::new();
        if !self.ack_queue.is_empty() {
            let payload = AckNackPayload::from_sequences(self.ack_queue.drain(..));
            frames.extend(payload.chunked(max_len).into_iter().map(Frame::Ack));
        }
        if !self.nack_queue.is_empty() {
            let payload = AckNackPayload::from_sequences(self.nack_queue.drain(..));
            frames.extend(payload.chunked(max_len).into_iter().map(Frame::Nack));
        }
        frames
    }

    /// Packs the send queue into datagrams no larger than the MTU allows,
    /// numbering each and tracking those carrying reliable packets.
    pub fn poll_datagrams(&mut self, now: Instant) -> Vec<Frame> {
        let max_len = self.max_datagram_len();
        let mut frames = Vec::new();
        let mut current = Vec::new();
        let mut size = RAKNET_DATAGRAM_HEADER_SIZE;

        while let Some(pkt) = self.outbound.pop_front() {
            let len = pkt.encoded_len();
            if !current.is_empty() && size + len > max_len {
                frames.push(self.seal(std::mem::take(&mut current), now));
                size = RAKNET_DATAGRAM_HEADER_SIZE;
            }
            size += len;
            current.push(pkt);
        }
        if !current.is_empty() {
            frames.push(self.seal(current, now));
        }
        frames
    }

    fn seal(&mut self, packets: Vec<EncapsulatedPacket>, now: Instant) -> Frame {
        let seq = self.next_datagram.fetch_next();
        self.highest_sent = Some(seq);
        let reliable: Vec<_> = packets
            .iter()
            .filter(|p| p.reliability.is_reliable())
            .cloned()
            .collect();
        if !reliable.is_empty() {
            self.sent.insert(
                seq.value(),
                SentDatagram {
                    packets: reliable,
                    sent_at: now,
                },
            );
        }
        Frame::Datagram(Datagram::new(seq, packets))
    }

    /// Whether the peer has been quiet long enough to warrant a ping, and
    /// no ping went out within the same window.
    pub fn needs_keepalive(&self, now: Instant, stale: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= stale
            && self
                .last_ping
                .is_none_or(|at| now.saturating_duration_since(at) >= stale)
    }

    pub(crate) fn mark_ping(&mut self, now: Instant) {
        self.last_ping = Some(now);
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }
}
