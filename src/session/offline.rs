//! The pre-connection handshake: pings, MTU discovery and identity exchange.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::config::ServerConfig;
use crate::protocol::{
    packet::{
        AlreadyConnected, IncompatibleProtocolVersion, NoFreeIncomingConnections, OfflinePacket,
        OpenConnectionReply1, OpenConnectionReply2, OpenConnectionRequest1,
        OpenConnectionRequest2, UnconnectedPing, UnconnectedPong,
    },
    state::HandshakeState,
    types::Advertisement,
};

use super::Session;

/// A peer that completed the MTU probe but has not yet sent request 2.
#[derive(Debug, Clone, Copy)]
struct PendingConnection {
    mtu: u16,
    first_seen: Instant,
}

/// What the manager should do with an offline packet.
#[derive(Debug)]
pub(crate) enum OfflineOutcome {
    Reply(OfflinePacket),
    /// Identity exchanged: create the session, then send the reply.
    Promote {
        client_guid: u64,
        mtu: u16,
        reply: OfflinePacket,
    },
    Drop,
}

#[derive(Debug, Default)]
pub(crate) struct OfflineHandler {
    pending: HashMap<SocketAddr, PendingConnection>,
}

impl OfflineHandler {
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Handshake progress of a peer that has no session yet.
    pub fn state_of(&self, peer: &SocketAddr) -> HandshakeState {
        if self.pending.contains_key(peer) {
            HandshakeState::MtuNegotiated
        } else {
            HandshakeState::Unconnected
        }
    }

    pub fn forget(&mut self, peer: &SocketAddr) {
        self.pending.remove(peer);
    }

    /// Forgets handshakes that stalled between request 1 and request 2.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, p| now.saturating_duration_since(p.first_seen) < timeout);
        before - self.pending.len()
    }

    pub fn handle(
        &mut self,
        packet: OfflinePacket,
        peer: SocketAddr,
        existing: Option<&Session>,
        session_count: usize,
        config: &ServerConfig,
        now: Instant,
    ) -> OfflineOutcome {
        match packet {
            OfflinePacket::UnconnectedPing(ping) => Self::pong(ping, config),
            OfflinePacket::UnconnectedPingOpenConnections(open) => {
                if session_count >= config.max_sessions {
                    return OfflineOutcome::Drop;
                }
                Self::pong(open.ping, config)
            }
            OfflinePacket::OpenConnectionRequest1(request) => {
                self.handle_request1(request, peer, existing, config, now)
            }
            OfflinePacket::OpenConnectionRequest2(request) => {
                self.handle_request2(request, peer, existing, session_count, config)
            }
            other => {
                tracing::debug!(peer = %peer, id = other.id(), "unexpected offline packet");
                OfflineOutcome::Drop
            }
        }
    }

    fn pong(ping: UnconnectedPing, config: &ServerConfig) -> OfflineOutcome {
        OfflineOutcome::Reply(
            UnconnectedPong {
                ping_time: ping.ping_time,
                server_guid: config.server_guid,
                advertisement: Advertisement(Some(config.advertisement.clone())),
            }
            .into(),
        )
    }

    fn handle_request1(
        &mut self,
        request: OpenConnectionRequest1,
        peer: SocketAddr,
        existing: Option<&Session>,
        config: &ServerConfig,
        now: Instant,
    ) -> OfflineOutcome {
        if request.protocol_version != config.protocol_version {
            tracing::debug!(
                peer = %peer,
                version = request.protocol_version,
                "incompatible protocol version"
            );
            return OfflineOutcome::Reply(
                IncompatibleProtocolVersion {
                    protocol: config.protocol_version,
                    server_guid: config.server_guid,
                }
                .into(),
            );
        }
        if existing.is_some_and(Session::is_connected) {
            return OfflineOutcome::Reply(
                AlreadyConnected {
                    server_guid: config.server_guid,
                }
                .into(),
            );
        }
        if request.mtu < config.min_mtu {
            tracing::debug!(peer = %peer, mtu = request.mtu, "MTU probe below minimum");
            return OfflineOutcome::Drop;
        }
        if !self.pending.contains_key(&peer) && self.pending.len() >= config.max_pending_connections
        {
            return OfflineOutcome::Reply(
                NoFreeIncomingConnections {
                    server_guid: config.server_guid,
                }
                .into(),
            );
        }

        let mtu = request.mtu.min(config.max_mtu);
        self.pending.insert(
            peer,
            PendingConnection {
                mtu,
                first_seen: now,
            },
        );
        tracing::debug!(peer = %peer, mtu, "MTU negotiated");
        OfflineOutcome::Reply(
            OpenConnectionReply1 {
                server_guid: config.server_guid,
                mtu,
            }
            .into(),
        )
    }

    fn handle_request2(
        &mut self,
        request: OpenConnectionRequest2,
        peer: SocketAddr,
        existing: Option<&Session>,
        session_count: usize,
        config: &ServerConfig,
    ) -> OfflineOutcome {
        if let Some(session) = existing {
            // lost reply 2, the client asks again
            if session.client_guid() == request.client_guid && !session.is_connected() {
                return OfflineOutcome::Reply(
                    OpenConnectionReply2 {
                        server_guid: config.server_guid,
                        client_addr: peer,
                        mtu: session.mtu(),
                        security: false,
                    }
                    .into(),
                );
            }
            return OfflineOutcome::Reply(
                AlreadyConnected {
                    server_guid: config.server_guid,
                }
                .into(),
            );
        }

        let Some(pending) = self.pending.remove(&peer) else {
            tracing::debug!(peer = %peer, "request 2 without request 1");
            return OfflineOutcome::Drop;
        };
        if session_count >= config.max_sessions {
            return OfflineOutcome::Reply(
                NoFreeIncomingConnections {
                    server_guid: config.server_guid,
                }
                .into(),
            );
        }

        let mtu = request.mtu.max(config.min_mtu).min(pending.mtu);
        OfflineOutcome::Promote {
            client_guid: request.client_guid,
            mtu,
            reply: OpenConnectionReply2 {
                server_guid: config.server_guid,
                client_addr: peer,
                mtu,
                security: false,
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::RaknetTime;
    use bytes::Bytes;

    fn peer() -> SocketAddr {
        "192.168.1.1:19132".parse().unwrap()
    }

    fn config() -> ServerConfig {
        ServerConfig::default()
            .with_server_guid(7)
            .with_advertisement(Bytes::from_static(b"MCPE;test"))
    }

    fn request1(mtu: u16) -> OfflinePacket {
        OpenConnectionRequest1 {
            protocol_version: 11,
            mtu,
        }
        .into()
    }

    fn request2(mtu: u16, guid: u64) -> OfflinePacket {
        OpenConnectionRequest2 {
            server_addr: "10.0.0.2:19132".parse().unwrap(),
            mtu,
            client_guid: guid,
        }
        .into()
    }

    #[test]
    fn answers_pings_with_advertisement() {
        let mut h = OfflineHandler::default();
        let ping = UnconnectedPing {
            ping_time: RaknetTime(99),
            client_guid: 1,
        };
        match h.handle(ping.into(), peer(), None, 0, &config(), Instant::now()) {
            OfflineOutcome::Reply(OfflinePacket::UnconnectedPong(pong)) => {
                assert_eq!(pong.ping_time, RaknetTime(99));
                assert_eq!(pong.server_guid, 7);
                assert_eq!(pong.advertisement.0.as_deref(), Some(&b"MCPE;test"[..]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn full_handshake_promotes() {
        let mut h = OfflineHandler::default();
        let cfg = config();
        let now = Instant::now();
        match h.handle(request1(1500), peer(), None, 0, &cfg, now) {
            OfflineOutcome::Reply(OfflinePacket::OpenConnectionReply1(reply)) => {
                assert_eq!(reply.mtu, 1400);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.state_of(&peer()), HandshakeState::MtuNegotiated);

        match h.handle(request2(1492, 55), peer(), None, 0, &cfg, now) {
            OfflineOutcome::Promote {
                client_guid, mtu, ..
            } => {
                assert_eq!(client_guid, 55);
                assert_eq!(mtu, 1400);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.state_of(&peer()), HandshakeState::Unconnected);
    }

    #[test]
    fn request2_without_request1_is_dropped() {
        let mut h = OfflineHandler::default();
        assert!(matches!(
            h.handle(request2(1400, 1), peer(), None, 0, &config(), Instant::now()),
            OfflineOutcome::Drop
        ));
    }

    #[test]
    fn rejects_wrong_protocol_and_tiny_mtu() {
        let mut h = OfflineHandler::default();
        let cfg = config();
        let wrong = OpenConnectionRequest1 {
            protocol_version: 9,
            mtu: 1400,
        };
        assert!(matches!(
            h.handle(wrong.into(), peer(), None, 0, &cfg, Instant::now()),
            OfflineOutcome::Reply(OfflinePacket::IncompatibleProtocolVersion(p)) if p.protocol == 11
        ));
        assert!(matches!(
            h.handle(request1(400), peer(), None, 0, &cfg, Instant::now()),
            OfflineOutcome::Drop
        ));
        assert_eq!(h.pending_len(), 0);
    }

    #[test]
    fn full_server_refuses() {
        let mut h = OfflineHandler::default();
        let cfg = ServerConfig {
            max_sessions: 1,
            ..config()
        };
        let now = Instant::now();
        h.handle(request1(1400), peer(), None, 1, &cfg, now);
        assert!(matches!(
            h.handle(request2(1400, 1), peer(), None, 1, &cfg, now),
            OfflineOutcome::Reply(OfflinePacket::NoFreeIncomingConnections(_))
        ));
    }

    #[test]
    fn existing_session_gets_reply2_again_or_already_connected() {
        let mut h = OfflineHandler::default();
        let cfg = config();
        let now = Instant::now();
        let mut session = Session::new(peer(), 55, 1200, &cfg, now);
        assert!(matches!(
            h.handle(request2(1400, 55), peer(), Some(&session), 1, &cfg, now),
            OfflineOutcome::Reply(OfflinePacket::OpenConnectionReply2(r)) if r.mtu == 1200
        ));
        assert!(matches!(
            h.handle(request2(1400, 56), peer(), Some(&session), 1, &cfg, now),
            OfflineOutcome::Reply(OfflinePacket::AlreadyConnected(_))
        ));
        session.set_state(HandshakeState::Connected);
        assert!(matches!(
            h.handle(request2(1400, 55), peer(), Some(&session), 1, &cfg, now),
            OfflineOutcome::Reply(OfflinePacket::AlreadyConnected(_))
        ));
    }

    #[test]
    fn stalled_handshakes_expire() {
        let mut h = OfflineHandler::default();
        let start = Instant::now();
        h.handle(request1(1400), peer(), None, 0, &config(), start);
        assert_eq!(h.expire(start + Duration::from_secs(1), Duration::from_secs(5)), 0);
        assert_eq!(h.expire(start + Duration::from_secs(5), Duration::from_secs(5)), 1);
    }
}
