use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::RaknetError;
use crate::config::ServerConfig;
use crate::protocol::constants::UDP_HEADER_SIZE;
use crate::session::manager::{SessionEvent, SessionManager};

use super::{Command, RaknetConnection};

/// Inbound payloads buffered per connection before new ones are dropped.
const CONNECTION_QUEUE: usize = 128;

type Inbox = mpsc::Sender<Result<Bytes, RaknetError>>;

/// Server-side RakNet listener that accepts new connections.
///
/// A background task owns the socket and the [`SessionManager`]; dropping
/// the listener disconnects every session and stops that task.
pub struct RaknetListener {
    local_addr: SocketAddr,
    new_connections: mpsc::Receiver<RaknetConnection>,
    commands: mpsc::Sender<Command>,
}

impl RaknetListener {
    /// Binds a new listener to the specified address.
    pub async fn bind(addr: SocketAddr, config: ServerConfig) -> Result<Self, RaknetError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let local_addr = socket.local_addr()?;
        let tick_interval = config.tick_interval;
        let max_mtu = config.max_mtu;
        let manager = SessionManager::new(config, socket.clone())?;

        let (new_conn_tx, new_conn_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(1024);

        tracing::info!(addr = %local_addr, "listening");
        tokio::spawn(run_listener_muxer(
            socket,
            manager,
            ListenerChannels {
                new_connections: new_conn_tx,
                commands: command_rx,
                command_tx: command_tx.clone(),
            },
            usize::from(max_mtu) + UDP_HEADER_SIZE + 64,
            tick_interval,
        ));

        Ok(Self {
            local_addr,
            new_connections: new_conn_rx,
            commands: command_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next peer to complete the handshake.
    pub async fn accept(&mut self) -> Option<RaknetConnection> {
        self.new_connections.recv().await
    }

    /// Replaces the payload sent in unconnected pongs.
    pub async fn set_advertisement(&self, data: impl Into<Bytes>) -> Result<(), RaknetError> {
        self.commands
            .send(Command::SetAdvertisement(data.into()))
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }
}

struct ListenerChannels {
    new_connections: mpsc::Sender<RaknetConnection>,
    commands: mpsc::Receiver<Command>,
    /// Handed to each new connection.
    command_tx: mpsc::Sender<Command>,
}

async fn run_listener_muxer(
    socket: Arc<UdpSocket>,
    mut manager: SessionManager<Arc<UdpSocket>>,
    mut channels: ListenerChannels,
    buf_len: usize,
    tick_interval: std::time::Duration,
) {
    let mut buf = vec![0u8; buf_len];
    let mut inboxes: HashMap<SocketAddr, Inbox> = HashMap::new();
    let mut tick = tokio::time::interval(tick_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            res = socket.recv_from(&mut buf) => {
                match res {
                    Ok((len, peer)) => manager.handle(&buf[..len], peer, Instant::now()),
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::ConnectionReset {
                            tracing::error!("UDP socket error: {}", e);
                        }
                        // Windows reports ICMP port unreachable as a reset.
                        continue;
                    }
                }
            }

            Some(cmd) = channels.commands.recv() => {
                let now = Instant::now();
                match cmd {
                    Command::Send { peer, message } => {
                        if let Err(e) = manager.send(peer, message, now) {
                            tracing::debug!(peer = %peer, error = %e, "send dropped");
                        }
                    }
                    Command::Disconnect(peer) => disconnect(&mut manager, peer),
                    Command::SetAdvertisement(data) => manager.set_advertisement(data),
                }
            }

            _ = tick.tick() => manager.tick(Instant::now()),

            _ = channels.new_connections.closed() => {
                manager.shutdown(Instant::now());
                tracing::info!("listener dropped, shutting down");
                return;
            }
        }

        route_events(&mut manager, &mut inboxes, &channels).await;
    }
}

async fn route_events(
    manager: &mut SessionManager<Arc<UdpSocket>>,
    inboxes: &mut HashMap<SocketAddr, Inbox>,
    channels: &ListenerChannels,
) {
    let events: Vec<SessionEvent> = manager.drain_events().collect();
    for event in events {
        match event {
            SessionEvent::Connected { peer, .. } => {
                let (tx, rx) = mpsc::channel(CONNECTION_QUEUE);
                let conn = RaknetConnection::new(peer, rx, channels.command_tx.clone());
                if channels.new_connections.send(conn).await.is_ok() {
                    inboxes.insert(peer, tx);
                } else {
                    disconnect(manager, peer);
                }
            }
            SessionEvent::Packet { peer, payload } => {
                let Some(inbox) = inboxes.get(&peer) else {
                    continue;
                };
                match inbox.try_send(Ok(payload)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        // acked payloads must never be dropped
                        tracing::warn!(peer = %peer, "connection queue full, disconnecting");
                        disconnect(manager, peer);
                    }
                    Err(TrySendError::Closed(_)) => {
                        // handle dropped by the application
                        inboxes.remove(&peer);
                        disconnect(manager, peer);
                    }
                }
            }
            SessionEvent::Disconnected { peer, reason } => {
                if let Some(inbox) = inboxes.remove(&peer)
                    && inbox
                        .try_send(Err(RaknetError::Disconnected(reason)))
                        .is_err()
                {
                    tracing::debug!(peer = %peer, ?reason, "disconnect not delivered to handle");
                }
            }
        }
    }
}

fn disconnect(manager: &mut SessionManager<Arc<UdpSocket>>, peer: SocketAddr) {
    if let Err(e) = manager.disconnect(peer, Instant::now()) {
        tracing::debug!(peer = %peer, error = %e, "disconnect failed");
    }
}
