/// Lifecycle of a peer, from the first offline request to eviction.
///
/// `Unconnected` and `MtuNegotiated` are tracked by the offline handler
/// before any session exists; a session starts at `IdentityExchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeState {
    Unconnected,
    MtuNegotiated,
    IdentityExchanged,
    Connected,
    Closed,
}

/// Why a session ended, as surfaced to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer sent a disconnection notification.
    ClosedByRemotePeer,
    /// The server is shutting down.
    ShuttingDown,
    /// Closed locally via the manager or a connection handle.
    Disconnected,
    /// No inbound traffic within the session timeout.
    TimedOut,
    /// The peer outran the split or ordering buffers with reliable data.
    QueueTooLong,
    /// The peer sent reliable data that could never be delivered.
    BadPacket,
}
