//! Connected-mode control traffic: the online handshake, pings and
//! disconnect notifications.

use std::collections::VecDeque;
use std::time::Instant;

use crate::protocol::{
    datagram::Datagram,
    packet::{
        ConnectedPacket, ConnectedPing, ConnectedPong, ConnectionRequest,
        ConnectionRequestAccepted, DecodeError, EncodeError, connected::local_system_addresses,
    },
    reliability::Reliability,
    state::{DisconnectReason, HandshakeState},
    types::RaknetTime,
};

use super::{Delivery, Session, manager::SessionEvent};

/// Whether the session survives the datagram it just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Open,
    Closed(DisconnectReason),
}

/// Runs decoded datagrams through a session's reliability layer and acts
/// on the control packets that come out.
#[derive(Debug, Default)]
pub(crate) struct DatagramHandler;

impl DatagramHandler {
    pub fn handle(
        &self,
        session: &mut Session,
        datagram: Datagram,
        now: Instant,
        clock: RaknetTime,
        events: &mut VecDeque<SessionEvent>,
    ) -> Lifecycle {
        let deliveries = match session.handle_datagram(datagram, now) {
            Ok(deliveries) => deliveries,
            Err(e) => {
                tracing::warn!(peer = %session.addr(), error = %e, "reliable data refused");
                session.set_state(HandshakeState::Closed);
                let reason = match e {
                    DecodeError::OrderingBufferFull(_) | DecodeError::TooManySplitAssemblies(_) => {
                        DisconnectReason::QueueTooLong
                    }
                    _ => DisconnectReason::BadPacket,
                };
                return Lifecycle::Closed(reason);
            }
        };
        for delivery in deliveries {
            match delivery {
                Delivery::App(payload) => {
                    if session.is_connected() {
                        events.push_back(SessionEvent::Packet {
                            peer: session.addr(),
                            payload,
                        });
                    } else {
                        tracing::debug!(
                            peer = %session.addr(),
                            "application data before connection"
                        );
                    }
                }
                Delivery::Control(packet) => {
                    if let Lifecycle::Closed(reason) = self.control(session, packet, clock, events)
                    {
                        return Lifecycle::Closed(reason);
                    }
                }
            }
        }
        Lifecycle::Open
    }

    fn control(
        &self,
        session: &mut Session,
        packet: ConnectedPacket,
        clock: RaknetTime,
        events: &mut VecDeque<SessionEvent>,
    ) -> Lifecycle {
        let peer = session.addr();
        let queued = match packet {
            ConnectedPacket::ConnectionRequest(request) => {
                self.accept_connection(session, request, clock)
            }
            ConnectedPacket::NewIncomingConnection(_) => {
                if session.state() == HandshakeState::IdentityExchanged {
                    session.set_state(HandshakeState::Connected);
                    tracing::info!(peer = %peer, guid = session.client_guid(), "session connected");
                    events.push_back(SessionEvent::Connected {
                        peer,
                        client_guid: session.client_guid(),
                    });
                }
                Ok(())
            }
            ConnectedPacket::ConnectedPing(ping) => session.queue_connected(
                ConnectedPong {
                    ping_time: ping.ping_time,
                    pong_time: clock,
                }
                .into(),
                Reliability::Unreliable,
            ),
            ConnectedPacket::ConnectedPong(pong) => {
                tracing::trace!(peer = %peer, ping_time = pong.ping_time.0, "pong");
                Ok(())
            }
            ConnectedPacket::DisconnectionNotification(_) => {
                session.set_state(HandshakeState::Closed);
                return Lifecycle::Closed(DisconnectReason::ClosedByRemotePeer);
            }
            ConnectedPacket::ConnectionRequestAccepted(_) => {
                tracing::debug!(peer = %peer, "client-side packet sent to server");
                Ok(())
            }
        };
        if let Err(e) = queued {
            tracing::debug!(peer = %peer, error = %e, "failed to queue reply");
        }
        Lifecycle::Open
    }

    fn accept_connection(
        &self,
        session: &mut Session,
        request: ConnectionRequest,
        clock: RaknetTime,
    ) -> Result<(), EncodeError> {
        if request.client_guid != session.client_guid() {
            tracing::debug!(
                peer = %session.addr(),
                guid = request.client_guid,
                "connection request with mismatched guid"
            );
            return Ok(());
        }
        if session.is_connected() {
            return Ok(());
        }
        let accepted = ConnectionRequestAccepted {
            address: session.addr(),
            system_index: 0,
            system_addresses: local_system_addresses(),
            request_timestamp: request.timestamp,
            accepted_timestamp: clock,
        };
        session.queue_connected(accepted.into(), Reliability::ReliableOrdered)
    }

    /// Queues a keepalive ping on a quiet session.
    pub fn keepalive(&self, session: &mut Session, now: Instant, clock: RaknetTime) {
        let ping = ConnectedPing { ping_time: clock };
        match session.queue_connected(ping.into(), Reliability::Unreliable) {
            Ok(()) => session.mark_ping(now),
            Err(e) => tracing::debug!(peer = %session.addr(), error = %e, "failed to queue ping"),
        }
    }
}
