use std::net::SocketAddr;

use thiserror::Error;

use crate::protocol::{
    packet::{DecodeError, EncodeError},
    state::DisconnectReason,
};

/// Errors surfaced by the session manager and the tokio transport.
#[derive(Error, Debug)]
pub enum RaknetError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a session for {0} already exists")]
    SessionExists(SocketAddr),

    #[error("no session for {0}")]
    SessionNotFound(SocketAddr),

    #[error("session limit reached")]
    SessionLimitReached,

    /// Only IPv4 peers are supported.
    #[error("unsupported peer address {0}")]
    UnsupportedAddress(SocketAddr),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("disconnected: {0:?}")]
    Disconnected(DisconnectReason),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
