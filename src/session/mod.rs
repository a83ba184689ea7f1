//! Per-peer session state and the reliability engine that drives it.
//!
//! A [`Session`] is created once a peer completes the offline handshake
//! and owns every piece of per-peer working state: receive windows, ACK
//! queues, split assemblies, ordering buffers and the table of sent
//! datagrams awaiting acknowledgement. It performs no I/O; the
//! [`manager::SessionManager`] feeds it decoded frames and writes out the
//! frames it produces.

mod inbound;
pub mod manager;
mod offline;
mod online;
mod ordering;
mod outbound;
mod split;
mod window;

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;

use crate::config::ServerConfig;
use crate::protocol::{
    constants::{
        IP_UDP_OVERHEAD, MAXIMUM_ENCAPSULATED_HEADER_SIZE, MAXIMUM_RECEIVE_WINDOW,
        RAKNET_DATAGRAM_HEADER_SIZE,
    },
    encapsulated_packet::{EncapsulatedPacket, SplitInfo},
    packet::{ConnectedPacket, EncodeError},
    reliability::Reliability,
    state::HandshakeState,
    types::Sequence24,
};

pub use inbound::Delivery;
pub use ordering::{OrderingChannels, OrderingWriter};
pub use split::SplitAssembler;
pub use window::{Receipt, SequenceWindow};

/// A datagram kept for resending until the peer acknowledges it.
#[derive(Debug, Clone)]
struct SentDatagram {
    packets: Vec<EncapsulatedPacket>,
    sent_at: Instant,
}

#[derive(Debug)]
pub struct Session {
    addr: SocketAddr,
    client_guid: u64,
    mtu: u16,
    state: HandshakeState,

    datagram_window: SequenceWindow,
    reliable_window: SequenceWindow,
    ack_queue: Vec<Sequence24>,
    nack_queue: Vec<Sequence24>,
    splits: SplitAssembler,
    ordering: OrderingChannels,

    next_datagram: Sequence24,
    highest_sent: Option<Sequence24>,
    next_reliable: Sequence24,
    next_split_id: u16,
    ordering_writer: OrderingWriter,
    outbound: VecDeque<EncapsulatedPacket>,
    sent: HashMap<u32, SentDatagram>,

    last_activity: Instant,
    last_ping: Option<Instant>,
    max_split_count: u32,
    was_connected: bool,
}

impl Session {
    pub fn new(
        addr: SocketAddr,
        client_guid: u64,
        mtu: u16,
        config: &ServerConfig,
        now: Instant,
    ) -> Self {
        Self {
            addr,
            client_guid,
            mtu,
            state: HandshakeState::IdentityExchanged,
            datagram_window: SequenceWindow::new(MAXIMUM_RECEIVE_WINDOW),
            reliable_window: SequenceWindow::new(MAXIMUM_RECEIVE_WINDOW),
            ack_queue: Vec::new(),
            nack_queue: Vec::new(),
            splits: SplitAssembler::new(config.max_split_assemblies, config.max_split_count),
            ordering: OrderingChannels::new(config.max_ordered_pending),
            next_datagram: Sequence24::ZERO,
            highest_sent: None,
            next_reliable: Sequence24::ZERO,
            next_split_id: 0,
            ordering_writer: OrderingWriter::default(),
            outbound: VecDeque::new(),
            sent: HashMap::new(),
            last_activity: now,
            last_ping: None,
            max_split_count: config.max_split_count,
            was_connected: false,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn client_guid(&self) -> u64 {
        self.client_guid
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: HandshakeState) {
        tracing::trace!(peer = %self.addr, from = ?self.state, to = ?state, "session state");
        self.was_connected |= state == HandshakeState::Connected;
        self.state = state;
    }

    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Whether the session ever reached `Connected`, even if closed since.
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Highest datagram sequence number handed out so far, if any.
    pub fn highest_sent(&self) -> Option<Sequence24> {
        self.highest_sent
    }

    /// Every datagram below this number has been received.
    pub fn receive_watermark(&self) -> Sequence24 {
        self.datagram_window.next_expected()
    }

    /// Received sequence numbers not yet acknowledged.
    pub fn pending_acks(&self) -> usize {
        self.ack_queue.len()
    }

    /// Sent reliable datagrams still waiting for an ACK.
    pub fn unacked_datagrams(&self) -> usize {
        self.sent.len()
    }

    pub fn queued_packets(&self) -> usize {
        self.outbound.len()
    }

    pub fn split_assemblies(&self) -> usize {
        self.splits.len()
    }

    /// Largest datagram this session may put on the wire.
    pub(crate) fn max_datagram_len(&self) -> usize {
        usize::from(self.mtu).saturating_sub(IP_UDP_OVERHEAD)
    }

    /// Largest payload that fits a single encapsulated packet.
    fn max_payload_len(&self) -> usize {
        self.max_datagram_len()
            .saturating_sub(RAKNET_DATAGRAM_HEADER_SIZE + MAXIMUM_ENCAPSULATED_HEADER_SIZE)
            .max(1)
    }

    /// Encodes a control packet and queues it.
    pub(crate) fn queue_connected(
        &mut self,
        packet: ConnectedPacket,
        reliability: Reliability,
    ) -> Result<(), EncodeError> {
        let mut buf = bytes::BytesMut::new();
        packet.encode(&mut buf)?;
        self.queue_packet(buf.freeze(), reliability, 0)
    }

    /// Queues a payload for sending, splitting it when it does not fit a
    /// single datagram. Nothing is written until the next transmit poll.
    pub fn queue_packet(
        &mut self,
        payload: Bytes,
        reliability: Reliability,
        channel: u8,
    ) -> Result<(), EncodeError> {
        let max_len = self.max_payload_len();
        let split_count = payload.len().div_ceil(max_len);
        let reliability = if split_count > 1 {
            reliability.upgraded_for_split()
        } else {
            reliability
        };

        let (ordering_index, sequence_index) = match self.ordering_writer.assign(
            channel,
            reliability.is_ordered(),
            reliability.is_sequenced(),
        ) {
            Some((order, sequence)) => (Some(order), sequence),
            None if reliability.has_ordering() => {
                return Err(EncodeError::MissingField("ordering_channel"));
            }
            None => (None, None),
        };
        let ordering_channel = ordering_index.map(|_| channel);

        if split_count <= 1 {
            let reliable_index = reliability
                .is_reliable()
                .then(|| self.next_reliable.fetch_next());
            self.outbound.push_back(EncapsulatedPacket {
                reliability,
                reliable_index,
                sequence_index,
                ordering_index,
                ordering_channel,
                split: None,
                payload,
            });
            return Ok(());
        }

        let count = u32::try_from(split_count)
            .ok()
            .filter(|count| *count <= self.max_split_count)
            .ok_or(EncodeError::PayloadTooLarge(payload.len()))?;
        let id = self.next_split_id;
        self.next_split_id = self.next_split_id.wrapping_add(1);
        tracing::trace!(peer = %self.addr, id, count, len = payload.len(), "splitting packet");

        for (index, start) in (0..payload.len()).step_by(max_len).enumerate() {
            let end = (start + max_len).min(payload.len());
            self.outbound.push_back(EncapsulatedPacket {
                reliability,
                reliable_index: Some(self.next_reliable.fetch_next()),
                sequence_index,
                ordering_index,
                ordering_channel,
                split: Some(SplitInfo {
                    count,
                    id,
                    index: index as u32,
                }),
                payload: payload.slice(start..end),
            });
        }
        Ok(())
    }
}
