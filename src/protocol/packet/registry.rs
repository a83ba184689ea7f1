use bytes::{Buf, BufMut};

use super::utils::define_raknet_packets;
use super::*;

define_raknet_packets! {
    /// Pre-session packets; every variant carries the offline magic.
    #[derive(Debug, Clone)]
    pub enum OfflinePacket {
        UnconnectedPing,
        UnconnectedPingOpenConnections,
        OpenConnectionRequest1,
        OpenConnectionReply1,
        OpenConnectionRequest2,
        OpenConnectionReply2,
        AlreadyConnected,
        NoFreeIncomingConnections,
        IncompatibleProtocolVersion,
        UnconnectedPong,
    }
}

define_raknet_packets! {
    /// Control packets carried in the payload of encapsulated packets.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ConnectedPacket {
        ConnectedPing,
        ConnectedPong,
        ConnectionRequest,
        ConnectionRequestAccepted,
        NewIncomingConnection,
        DisconnectionNotification,
    }
}
