//! The session registry: dispatches inbound packets, owns the send path and
//! drives periodic maintenance.
//!
//! Everything here is synchronous. The caller feeds raw datagrams into
//! [`SessionManager::handle`] in socket order, calls
//! [`SessionManager::tick`] on a fixed interval, and drains
//! [`SessionEvent`]s afterwards.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;

use crate::{
    RaknetError,
    config::ServerConfig,
    protocol::{
        cursor::ByteCursor,
        frame::Frame,
        packet::{ConnectedPacket, DisconnectionNotification, OfflinePacket},
        reliability::Reliability,
        state::{DisconnectReason, HandshakeState},
        types::RaknetTime,
    },
    transport::{Message, PacketSink},
};

use super::{
    Session,
    offline::{OfflineHandler, OfflineOutcome},
    online::{DatagramHandler, Lifecycle},
};

/// Something the application should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { peer: SocketAddr, client_guid: u64 },
    /// Application payload, starting with its ID byte.
    Packet { peer: SocketAddr, payload: Bytes },
    Disconnected { peer: SocketAddr, reason: DisconnectReason },
}

/// Traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    /// Inbound datagrams discarded as malformed or unroutable.
    pub dropped: u64,
    pub send_errors: u64,
}

pub struct SessionManager<S: PacketSink> {
    config: ServerConfig,
    socket: S,
    sessions: HashMap<SocketAddr, Session>,
    offline: OfflineHandler,
    online: DatagramHandler,
    events: VecDeque<SessionEvent>,
    stats: ManagerStats,
    epoch: Instant,
}

impl<S: PacketSink> SessionManager<S> {
    pub fn new(config: ServerConfig, socket: S) -> Result<Self, RaknetError> {
        config.validate()?;
        Ok(Self {
            config,
            socket,
            sessions: HashMap::new(),
            offline: OfflineHandler::default(),
            online: DatagramHandler,
            events: VecDeque::new(),
            stats: ManagerStats::default(),
            epoch: Instant::now(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn socket(&self) -> &S {
        &self.socket
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    pub fn set_advertisement(&mut self, advertisement: impl Into<Bytes>) {
        self.config.advertisement = advertisement.into();
    }

    fn clock(&self, now: Instant) -> RaknetTime {
        now.saturating_duration_since(self.epoch).into()
    }

    /// Registers a session for `addr`.
    ///
    /// A second create for a live address is rejected with
    /// [`RaknetError::SessionExists`] and leaves the first session as is.
    /// The MTU is clamped to the configured bounds.
    pub fn create_session(
        &mut self,
        addr: SocketAddr,
        client_guid: u64,
        mtu: u16,
        now: Instant,
    ) -> Result<&mut Session, RaknetError> {
        if !addr.is_ipv4() {
            return Err(RaknetError::UnsupportedAddress(addr));
        }
        if self.sessions.contains_key(&addr) {
            return Err(RaknetError::SessionExists(addr));
        }
        if self.sessions.len() >= self.config.max_sessions {
            return Err(RaknetError::SessionLimitReached);
        }
        let mtu = mtu.max(self.config.min_mtu).min(self.config.max_mtu);
        tracing::info!(peer = %addr, guid = client_guid, mtu, "session created");
        self.offline.forget(&addr);
        let session = Session::new(addr, client_guid, mtu, &self.config, now);
        Ok(self.sessions.entry(addr).or_insert(session))
    }

    pub fn session_exists(&self, addr: &SocketAddr) -> bool {
        self.sessions.contains_key(addr)
    }

    pub fn get_session(&self, addr: &SocketAddr) -> Option<&Session> {
        self.sessions.get(addr)
    }

    pub fn get_session_mut(&mut self, addr: &SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(addr)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Handshake progress of any peer, with or without a session.
    pub fn handshake_state(&self, addr: &SocketAddr) -> HandshakeState {
        self.sessions
            .get(addr)
            .map_or_else(|| self.offline.state_of(addr), Session::state)
    }

    /// Peers past the MTU probe that have not yet sent request 2.
    pub fn pending_handshakes(&self) -> usize {
        self.offline.pending_len()
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    /// Decodes one inbound datagram and dispatches it: offline packets to
    /// the handshake handler, everything else to the sender's session.
    /// Malformed input is dropped here and never surfaces as an error.
    pub fn handle(&mut self, bytes: &[u8], peer: SocketAddr, now: Instant) {
        self.stats.bytes_received += bytes.len() as u64;
        self.stats.datagrams_received += 1;
        if !peer.is_ipv4() {
            self.stats.dropped += 1;
            tracing::debug!(peer = %peer, "ignoring non-IPv4 peer");
            return;
        }

        let mut cursor = ByteCursor::from(bytes);
        let frame = match Frame::decode(&mut cursor) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.dropped += 1;
                tracing::debug!(
                    peer = %peer,
                    error = %e,
                    len = bytes.len(),
                    "dropping malformed packet"
                );
                return;
            }
        };

        match frame {
            Frame::Offline(packet) => self.handle_offline(packet, peer, now),
            Frame::Datagram(datagram) => {
                let clock = self.clock(now);
                let Some(session) = self.sessions.get_mut(&peer) else {
                    self.stats.dropped += 1;
                    tracing::debug!(peer = %peer, "datagram from unknown peer");
                    return;
                };
                match self
                    .online
                    .handle(session, datagram, now, clock, &mut self.events)
                {
                    Lifecycle::Open => self.flush(peer, now),
                    Lifecycle::Closed(reason) => {
                        // ack the final datagram before the session goes
                        self.flush_acks(peer);
                        if reason == DisconnectReason::ClosedByRemotePeer {
                            self.evict(peer, reason);
                        } else if let Err(e) = self.close(peer, reason, now) {
                            tracing::debug!(peer = %peer, error = %e, "close failed");
                            self.evict(peer, reason);
                        }
                    }
                }
            }
            Frame::Ack(payload) => match self.sessions.get_mut(&peer) {
                Some(session) => session.handle_ack(&payload, now),
                None => self.stats.dropped += 1,
            },
            Frame::Nack(payload) => match self.sessions.get_mut(&peer) {
                Some(session) => {
                    session.handle_nack(&payload, now);
                    self.flush(peer, now);
                }
                None => self.stats.dropped += 1,
            },
        }
    }

    fn handle_offline(&mut self, packet: OfflinePacket, peer: SocketAddr, now: Instant) {
        let outcome = self.offline.handle(
            packet,
            peer,
            self.sessions.get(&peer),
            self.sessions.len(),
            &self.config,
            now,
        );
        match outcome {
            OfflineOutcome::Reply(reply) => self.transmit(&reply.into(), peer),
            OfflineOutcome::Promote {
                client_guid,
                mtu,
                reply,
            } => match self.create_session(peer, client_guid, mtu, now) {
                Ok(_) => self.transmit(&reply.into(), peer),
                Err(e) => tracing::debug!(peer = %peer, error = %e, "could not promote peer"),
            },
            OfflineOutcome::Drop => {}
        }
    }

    /// Encodes `frame` and writes it to `addr`, returning the bytes sent.
    pub fn send_packet(&mut self, frame: &Frame, addr: SocketAddr) -> Result<usize, RaknetError> {
        send_frame(&self.socket, &mut self.stats, frame, addr)
    }

    fn transmit(&mut self, frame: &Frame, addr: SocketAddr) {
        if let Err(e) = self.send_packet(frame, addr) {
            tracing::warn!(peer = %addr, error = %e, "send failed");
        }
    }

    /// Queues an application payload on a connected session and flushes it.
    pub fn send(
        &mut self,
        peer: SocketAddr,
        message: Message,
        now: Instant,
    ) -> Result<(), RaknetError> {
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(RaknetError::SessionNotFound(peer))?;
        if !session.is_connected() {
            return Err(RaknetError::ConnectionClosed);
        }
        if message.buffer.is_empty() {
            return Ok(());
        }
        session.queue_packet(message.buffer, message.reliability, message.channel)?;
        self.flush(peer, now);
        Ok(())
    }

    /// Notifies the peer, then evicts its session.
    pub fn disconnect(&mut self, peer: SocketAddr, now: Instant) -> Result<(), RaknetError> {
        self.close(peer, DisconnectReason::Disconnected, now)
    }

    /// Disconnects every session.
    pub fn shutdown(&mut self, now: Instant) {
        let peers: Vec<SocketAddr> = self.sessions.keys().copied().collect();
        for peer in peers {
            if let Err(e) = self.close(peer, DisconnectReason::ShuttingDown, now) {
                tracing::debug!(peer = %peer, error = %e, "close failed");
            }
        }
    }

    fn close(
        &mut self,
        peer: SocketAddr,
        reason: DisconnectReason,
        now: Instant,
    ) -> Result<(), RaknetError> {
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(RaknetError::SessionNotFound(peer))?;
        session.queue_connected(
            ConnectedPacket::from(DisconnectionNotification),
            Reliability::ReliableOrdered,
        )?;
        session.set_state(HandshakeState::Closed);
        self.flush(peer, now);
        self.evict(peer, reason);
        Ok(())
    }

    /// Periodic maintenance: resends, split expiry, ACK/NACK emission,
    /// keepalives, session timeouts and stalled handshakes.
    pub fn tick(&mut self, now: Instant) {
        let clock = self.clock(now);
        let mut expired = Vec::new();

        for (&peer, session) in self.sessions.iter_mut() {
            if session.is_timed_out(now, self.config.session_timeout) {
                expired.push(peer);
                continue;
            }
            session.collect_resends(now, self.config.resend_timeout);
            session.expire_splits(now, self.config.split_timeout);
            if session.needs_keepalive(now, self.config.session_stale) {
                self.online.keepalive(session, now, clock);
            }

            let mut frames = session.poll_acks();
            frames.extend(session.poll_datagrams(now));
            for frame in &frames {
                if let Err(e) = send_frame(&self.socket, &mut self.stats, frame, peer) {
                    tracing::warn!(peer = %peer, error = %e, "send failed");
                }
            }
        }

        for peer in expired {
            self.evict(peer, DisconnectReason::TimedOut);
        }

        let stalled = self.offline.expire(now, self.config.handshake_timeout);
        if stalled > 0 {
            tracing::debug!(stalled, "forgot stalled handshakes");
        }
    }

    /// Writes out whatever the session has queued, without waiting for the tick.
    fn flush(&mut self, peer: SocketAddr, now: Instant) {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return;
        };
        for frame in session.poll_datagrams(now) {
            if let Err(e) = send_frame(&self.socket, &mut self.stats, &frame, peer) {
                tracing::warn!(peer = %peer, error = %e, "send failed");
            }
        }
    }

    fn flush_acks(&mut self, peer: SocketAddr) {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return;
        };
        for frame in session.poll_acks() {
            if let Err(e) = send_frame(&self.socket, &mut self.stats, &frame, peer) {
                tracing::warn!(peer = %peer, error = %e, "send failed");
            }
        }
    }

    fn evict(&mut self, peer: SocketAddr, reason: DisconnectReason) {
        if let Some(session) = self.sessions.remove(&peer) {
            tracing::info!(peer = %peer, ?reason, "session closed");
            if session.was_connected() {
                self.events
                    .push_back(SessionEvent::Disconnected { peer, reason });
            }
        }
    }
}

fn send_frame<S: PacketSink>(
    socket: &S,
    stats: &mut ManagerStats,
    frame: &Frame,
    addr: SocketAddr,
) -> Result<usize, RaknetError> {
    let mut cursor = ByteCursor::new();
    cursor.append_with(|buf| frame.encode(buf))?;
    match socket.send_to(cursor.as_slice(), addr) {
        Ok(sent) => {
            stats.bytes_sent += sent as u64;
            stats.datagrams_sent += 1;
            tracing::trace!(peer = %addr, len = sent, "sent");
            Ok(sent)
        }
        Err(e) => {
            stats.send_errors += 1;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::protocol::{
        datagram::Datagram,
        encapsulated_packet::{EncapsulatedPacket, SplitInfo},
        packet::{ConnectedPing, OpenConnectionRequest1, UnconnectedPing},
        types::Sequence24,
    };

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    }

    impl PacketSink for RecordingSink {
        fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            self.sent.lock().unwrap().push((buf.to_vec(), target));
            Ok(buf.len())
        }
    }

    impl RecordingSink {
        fn take(&self) -> Vec<Frame> {
            self.sent
                .lock()
                .unwrap()
                .drain(..)
                .map(|(bytes, _)| Frame::decode(&mut ByteCursor::from(bytes)).unwrap())
                .collect()
        }
    }

    fn peer() -> SocketAddr {
        "10.0.0.1:5000".parse().unwrap()
    }

    fn manager() -> SessionManager<RecordingSink> {
        SessionManager::new(ServerConfig::default(), RecordingSink::default()).unwrap()
    }

    fn encode(frame: Frame) -> Vec<u8> {
        let mut cursor = ByteCursor::new();
        cursor.append_with(|buf| frame.encode(buf)).unwrap();
        cursor.as_slice().to_vec()
    }

    fn connected(m: &mut SessionManager<RecordingSink>, now: Instant) {
        m.create_session(peer(), 1, 1400, now)
            .unwrap()
            .set_state(HandshakeState::Connected);
    }

    fn reliable_ordered(index: u32, payload: Bytes) -> EncapsulatedPacket {
        EncapsulatedPacket {
            reliability: Reliability::ReliableOrdered,
            reliable_index: Some(Sequence24::new(index)),
            sequence_index: None,
            ordering_index: Some(Sequence24::new(index)),
            ordering_channel: Some(0),
            split: None,
            payload,
        }
    }

    fn datagram_bytes(seq: u32, packet: EncapsulatedPacket) -> Vec<u8> {
        encode(Frame::Datagram(Datagram::new(Sequence24::new(seq), vec![packet])))
    }

    fn acked(frames: &[Frame]) -> Vec<u32> {
        frames
            .iter()
            .filter_map(|f| match f {
                Frame::Ack(p) => Some(p.sequences().map(|s| s.value()).collect::<Vec<_>>()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn notified_disconnect(frames: &[Frame]) -> bool {
        frames.iter().any(|f| match f {
            Frame::Datagram(d) => d.packets.iter().any(|p| p.payload.first() == Some(&0x15)),
            _ => false,
        })
    }

    #[test]
    fn duplicate_create_keeps_first_session() {
        let mut m = manager();
        let now = Instant::now();
        m.create_session(peer(), 1, 1400, now).unwrap();
        assert!(matches!(
            m.create_session(peer(), 2, 600, now),
            Err(RaknetError::SessionExists(addr)) if addr == peer()
        ));
        assert!(m.session_exists(&peer()));
        assert_eq!(m.session_count(), 1);
        let session = m.get_session(&peer()).unwrap();
        assert_eq!(session.client_guid(), 1);
        assert_eq!(session.mtu(), 1400);
    }

    #[test]
    fn lookups_distinguish_absence() {
        let mut m = manager();
        assert!(!m.session_exists(&peer()));
        assert!(m.get_session(&peer()).is_none());
        assert!(matches!(
            m.send(peer(), Message::new(vec![0xfe]), Instant::now()),
            Err(RaknetError::SessionNotFound(_))
        ));
    }

    #[test]
    fn rejects_ipv6_and_clamps_mtu() {
        let mut m = manager();
        let v6: SocketAddr = "[::1]:5000".parse().unwrap();
        assert!(matches!(
            m.create_session(v6, 1, 1400, Instant::now()),
            Err(RaknetError::UnsupportedAddress(_))
        ));
        let session = m.create_session(peer(), 1, 9000, Instant::now()).unwrap();
        assert_eq!(session.mtu(), 1400);
    }

    #[test]
    fn session_limit_is_enforced() {
        let mut m = SessionManager::new(
            ServerConfig {
                max_sessions: 1,
                ..Default::default()
            },
            RecordingSink::default(),
        )
        .unwrap();
        m.create_session(peer(), 1, 1400, Instant::now()).unwrap();
        assert!(matches!(
            m.create_session("10.0.0.2:5000".parse().unwrap(), 2, 1400, Instant::now()),
            Err(RaknetError::SessionLimitReached)
        ));
    }

    #[test]
    fn ping_is_answered_and_garbage_dropped() {
        let mut m = manager();
        let ping = Frame::from(OfflinePacket::from(UnconnectedPing {
            ping_time: RaknetTime(5),
            client_guid: 3,
        }));
        m.handle(&encode(ping), peer(), Instant::now());
        assert!(matches!(
            m.socket().take().as_slice(),
            [Frame::Offline(OfflinePacket::UnconnectedPong(_))]
        ));

        let mut bad = encode(Frame::from(OfflinePacket::from(UnconnectedPing {
            ping_time: RaknetTime(5),
            client_guid: 3,
        })));
        // inside the magic
        bad[12] ^= 0xff;
        m.handle(&bad, peer(), Instant::now());
        m.handle(&[], peer(), Instant::now());
        assert!(m.socket().take().is_empty());
        assert_eq!(m.stats().dropped, 2);
        assert!(m.stats().bytes_sent > 0);
    }

    #[test]
    fn datagram_from_unknown_peer_is_dropped() {
        let mut m = manager();
        let datagram = Frame::Datagram(Datagram::new(
            Sequence24::ZERO,
            vec![EncapsulatedPacket::unreliable(Bytes::from_static(b"\xfe"))],
        ));
        m.handle(&encode(datagram), peer(), Instant::now());
        assert_eq!(m.stats().dropped, 1);
        assert!(m.socket().take().is_empty());
    }

    #[test]
    fn tick_acks_and_evicts_idle_sessions() {
        let mut m = manager();
        let start = Instant::now();
        m.create_session(peer(), 1, 1400, start).unwrap();

        let mut ping = bytes::BytesMut::new();
        ConnectedPacket::from(ConnectedPing {
            ping_time: RaknetTime(1),
        })
        .encode(&mut ping)
        .unwrap();
        let datagram = Frame::Datagram(Datagram::new(
            Sequence24::ZERO,
            vec![EncapsulatedPacket::unreliable(ping.freeze())],
        ));
        m.handle(&encode(datagram), peer(), start);
        // pong goes out immediately, the ACK waits for the tick
        assert!(matches!(m.socket().take().as_slice(), [Frame::Datagram(_)]));
        m.tick(start);
        assert!(matches!(m.socket().take().as_slice(), [Frame::Ack(_)]));

        m.tick(start + Duration::from_secs(6));
        assert!(matches!(m.socket().take().as_slice(), [Frame::Datagram(_)]));
        assert!(m.session_exists(&peer()));

        m.tick(start + Duration::from_secs(11));
        assert!(!m.session_exists(&peer()));
        // never connected, so no event
        assert!(m.poll_event().is_none());
    }

    #[test]
    fn request1_is_tracked_as_pending() {
        let mut m = manager();
        let request = Frame::from(OfflinePacket::from(OpenConnectionRequest1 {
            protocol_version: 11,
            mtu: 1200,
        }));
        m.handle(&encode(request), peer(), Instant::now());
        assert_eq!(m.pending_handshakes(), 1);
        assert_eq!(m.handshake_state(&peer()), HandshakeState::MtuNegotiated);
    }

    #[test]
    fn peer_disconnect_is_acked_before_eviction() {
        let mut m = manager();
        let now = Instant::now();
        connected(&mut m, now);
        let mut bye = bytes::BytesMut::new();
        ConnectedPacket::from(DisconnectionNotification)
            .encode(&mut bye)
            .unwrap();
        m.handle(&datagram_bytes(0, reliable_ordered(0, bye.freeze())), peer(), now);

        assert_eq!(acked(&m.socket().take()), vec![0]);
        assert!(!m.session_exists(&peer()));
        assert_eq!(
            m.poll_event(),
            Some(SessionEvent::Disconnected {
                peer: peer(),
                reason: DisconnectReason::ClosedByRemotePeer
            })
        );
    }

    #[test]
    fn ordering_overflow_disconnects_instead_of_stalling() {
        let mut m = SessionManager::new(
            ServerConfig {
                max_ordered_pending: 2,
                ..Default::default()
            },
            RecordingSink::default(),
        )
        .unwrap();
        let now = Instant::now();
        connected(&mut m, now);
        // order index 0 is lost on the way
        for index in 1..=3 {
            let payload = Bytes::from(vec![0xfe, index as u8]);
            m.handle(&datagram_bytes(index, reliable_ordered(index, payload)), peer(), now);
        }

        let frames = m.socket().take();
        assert_eq!(acked(&frames), vec![1, 2, 3]);
        assert!(notified_disconnect(&frames));
        assert!(!m.session_exists(&peer()));
        assert_eq!(
            m.drain_events().collect::<Vec<_>>(),
            vec![SessionEvent::Disconnected {
                peer: peer(),
                reason: DisconnectReason::QueueTooLong
            }]
        );
    }

    #[test]
    fn split_cap_disconnects_instead_of_losing_fragment() {
        let mut m = SessionManager::new(
            ServerConfig {
                max_split_assemblies: 1,
                ..Default::default()
            },
            RecordingSink::default(),
        )
        .unwrap();
        let now = Instant::now();
        connected(&mut m, now);
        let fragment = |index: u32, id: u16| EncapsulatedPacket {
            split: Some(SplitInfo {
                count: 2,
                id,
                index: 0,
            }),
            ..reliable_ordered(index, Bytes::from_static(b"\xfe"))
        };
        m.handle(&datagram_bytes(0, fragment(0, 1)), peer(), now);
        assert!(m.session_exists(&peer()));
        m.handle(&datagram_bytes(1, fragment(1, 2)), peer(), now);

        assert!(notified_disconnect(&m.socket().take()));
        assert!(!m.session_exists(&peer()));
        assert_eq!(
            m.poll_event(),
            Some(SessionEvent::Disconnected {
                peer: peer(),
                reason: DisconnectReason::QueueTooLong
            })
        );
    }

    #[test]
    fn server_disconnect_notifies_peer() {
        let mut m = manager();
        let now = Instant::now();
        m.create_session(peer(), 1, 1400, now)
            .unwrap()
            .set_state(HandshakeState::Connected);
        m.disconnect(peer(), now).unwrap();
        assert!(!m.session_exists(&peer()));
        assert_eq!(
            m.poll_event(),
            Some(SessionEvent::Disconnected {
                peer: peer(),
                reason: DisconnectReason::Disconnected
            })
        );
        match m.socket().take().as_slice() {
            [Frame::Datagram(d)] => assert_eq!(d.packets[0].payload[0], 0x15),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            m.disconnect(peer(), now),
            Err(RaknetError::SessionNotFound(_))
        ));
    }

    #[test]
    fn shutdown_closes_every_session() {
        let mut m = manager();
        let now = Instant::now();
        let other: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        m.create_session(peer(), 1, 1400, now)
            .unwrap()
            .set_state(HandshakeState::Connected);
        m.create_session(other, 2, 1400, now).unwrap();
        m.shutdown(now);
        assert_eq!(m.session_count(), 0);
        assert_eq!(
            m.poll_event(),
            Some(SessionEvent::Disconnected {
                peer: peer(),
                reason: DisconnectReason::ShuttingDown
            })
        );
        assert_eq!(m.poll_event(), None);
        let notified = m
            .socket()
            .take()
            .iter()
            .filter(|f| notified_disconnect(std::slice::from_ref(f)))
            .count();
        assert_eq!(notified, 2);
    }
}
