use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::RaknetError;

use super::{Command, Message};

/// Server-side connection handle returned from `RaknetListener::accept`.
pub struct RaknetConnection {
    peer: SocketAddr,
    incoming: mpsc::Receiver<Result<Bytes, RaknetError>>,
    commands: mpsc::Sender<Command>,
}

impl RaknetConnection {
    pub(crate) fn new(
        peer: SocketAddr,
        incoming: mpsc::Receiver<Result<Bytes, RaknetError>>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            peer,
            incoming,
            commands,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Next application payload (ID byte included). Yields a
    /// [`RaknetError::Disconnected`] once the session ends, then `None`.
    pub async fn recv(&mut self) -> Option<Result<Bytes, RaknetError>> {
        self.incoming.recv().await
    }

    pub async fn send(&self, msg: impl Into<Message>) -> Result<(), RaknetError> {
        let message = msg.into();
        if message.buffer.is_empty() {
            return Ok(());
        }
        self.commands
            .send(Command::Send {
                peer: self.peer,
                message,
            })
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }

    /// Notifies the peer and closes the session.
    pub async fn disconnect(self) -> Result<(), RaknetError> {
        self.commands
            .send(Command::Disconnect(self.peer))
            .await
            .map_err(|_| RaknetError::ConnectionClosed)
    }
}
