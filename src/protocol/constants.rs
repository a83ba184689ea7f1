use bitflags::bitflags;
use std::{
    net::{Ipv4Addr, SocketAddrV4},
    time::Duration,
};

use crate::protocol::types::Magic;

pub const RAKNET_PROTOCOL_VERSION: u8 = 11; // Mojang's version.
pub const MINIMUM_MTU_SIZE: u16 = 576;
pub const MAXIMUM_MTU_SIZE: u16 = 1400;

/// Added to the bytes following the magic of an OpenConnectionRequest1 to
/// derive the MTU the client probed with.
pub const OPEN_CONNECTION_MTU_OVERHEAD: u16 = 18;

/// Maximum amount of ordering channels as defined in vanilla RakNet.
pub const MAXIMUM_ORDERING_CHANNELS: u8 = 32;

/// Maximum size of an [EncapsulatedPacket] header.
///
/// [EncapsulatedPacket]: crate::protocol::encapsulated_packet::EncapsulatedPacket
pub const MAXIMUM_ENCAPSULATED_HEADER_SIZE: usize = 28;

pub const UDP_HEADER_SIZE: usize = 8;
pub const IPV4_HEADER_SIZE: usize = 20;

/// Bytes of an MTU taken by the IP and UDP headers.
pub const IP_UDP_OVERHEAD: usize = IPV4_HEADER_SIZE + UDP_HEADER_SIZE;

pub const RAKNET_DATAGRAM_HEADER_SIZE: usize = 4;

/// Upper bound on the sequence numbers one ACK/NACK record may cover.
pub const MAXIMUM_ACK_RANGE_SPAN: u32 = 8192;

/// Maximum amount of fragments accepted for a single split packet.
pub const MAXIMUM_SPLIT_COUNT: u32 = 1024;

/// Largest window of out-of-order sequence numbers tracked per session.
pub const MAXIMUM_RECEIVE_WINDOW: u32 = 1 << 16;

/// First ID of application (user) packets inside a session.
pub const USER_PACKET_ID_START: u8 = 0x80;

pub const MAX_PENDING_CONNECTIONS: usize = 1024;

/// Time after which a session is closed due to no activity.
pub const SESSION_TIMEOUT: Duration = Duration::from_millis(10000);

/// Time after which a session is refreshed due to no activity.
pub const SESSION_STALE: Duration = Duration::from_millis(5000);

/// Length of one RakNet tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

pub const DEFAULT_RESEND_TIMEOUT: Duration = Duration::from_millis(500);

bitflags! {
    /// Represents all the flags for a RakNet datagram frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DatagramFlags: u8 {
        const VALID            = 0b1000_0000;
        const ACK              = 0b0100_0000;

        // FLAG_NACK and FLAG_HAS_B_AND_AS are the same bit.
        const NACK             = 0b0010_0000;
        const HAS_B_AND_AS     = 0b0010_0000;

        const PACKET_PAIR      = 0b0001_0000;
        const CONTINUOUS_SEND  = 0b0000_1000;
        const NEEDS_B_AND_AS   = 0b0000_0100;

        const RELIABILITY_FLAGS = Self::ACK.bits() | Self::NACK.bits();
    }
}

/// Magic used to identify RakNet packets
pub const DEFAULT_UNCONNECTED_MAGIC: Magic = [
    0x00, 0xFF, 0xFF, 0x00, 0xFE, 0xFE, 0xFE, 0xFE, 0xFD, 0xFD, 0xFD, 0xFD, 0x12, 0x34, 0x56, 0x78,
];

pub const LOOPBACK_V4: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
pub const ANY_V4: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);

pub const LOCAL_IP_ADDRESSES_V4: [SocketAddrV4; 10] = [
    LOOPBACK_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
    ANY_V4,
];
