//! Server-side configuration passed explicitly into the session manager.

use std::time::Duration;

use bytes::Bytes;

use crate::{
    RaknetError,
    protocol::constants::{
        self, DEFAULT_RESEND_TIMEOUT, DEFAULT_TICK_INTERVAL, MAX_PENDING_CONNECTIONS,
        MAXIMUM_MTU_SIZE, MAXIMUM_SPLIT_COUNT, MINIMUM_MTU_SIZE, RAKNET_PROTOCOL_VERSION,
    },
};

/// Tunables for the handshake, the reliability layer and session lifetime.
///
/// The tick interval bounds how long ACKs, resends and queued sends wait,
/// and together with the timeouts how long incomplete state is retained.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier sent in pongs and handshake replies.
    pub server_guid: u64,
    pub protocol_version: u8,
    pub min_mtu: u16,
    pub max_mtu: u16,
    pub max_sessions: usize,
    /// Peers that have sent OpenConnectionRequest1 but not yet request 2.
    pub max_pending_connections: usize,
    /// Payload of unconnected pongs (e.g. a MOTD string).
    pub advertisement: Bytes,
    pub tick_interval: Duration,
    /// Unacknowledged reliable datagrams are resent after this long.
    pub resend_timeout: Duration,
    /// Sessions with no inbound traffic for this long are evicted.
    pub session_timeout: Duration,
    /// Idle time after which a keepalive ping is sent.
    pub session_stale: Duration,
    /// Pending offline handshakes are forgotten after this long.
    pub handshake_timeout: Duration,
    /// Incomplete split packets are dropped after this long.
    pub split_timeout: Duration,
    pub max_split_assemblies: usize,
    pub max_split_count: u32,
    /// Out-of-order packets buffered per ordering channel.
    pub max_ordered_pending: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_guid: rand::random(),
            protocol_version: RAKNET_PROTOCOL_VERSION,
            min_mtu: MINIMUM_MTU_SIZE,
            max_mtu: MAXIMUM_MTU_SIZE,
            max_sessions: 1024,
            max_pending_connections: MAX_PENDING_CONNECTIONS,
            advertisement: Bytes::new(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            resend_timeout: DEFAULT_RESEND_TIMEOUT,
            session_timeout: constants::SESSION_TIMEOUT,
            session_stale: constants::SESSION_STALE,
            handshake_timeout: Duration::from_secs(5),
            split_timeout: Duration::from_secs(10),
            max_split_assemblies: 32,
            max_split_count: MAXIMUM_SPLIT_COUNT,
            max_ordered_pending: 1024,
        }
    }
}

impl ServerConfig {
    pub fn with_advertisement(mut self, advertisement: impl Into<Bytes>) -> Self {
        self.advertisement = advertisement.into();
        self
    }

    pub fn with_server_guid(mut self, guid: u64) -> Self {
        self.server_guid = guid;
        self
    }

    pub fn validate(&self) -> Result<(), RaknetError> {
        if self.min_mtu > self.max_mtu {
            return Err(RaknetError::InvalidConfig(format!(
                "min_mtu {} exceeds max_mtu {}",
                self.min_mtu, self.max_mtu
            )));
        }
        let overhead = constants::IP_UDP_OVERHEAD
            + constants::RAKNET_DATAGRAM_HEADER_SIZE
            + constants::MAXIMUM_ENCAPSULATED_HEADER_SIZE;
        if usize::from(self.min_mtu) <= overhead {
            return Err(RaknetError::InvalidConfig(format!(
                "min_mtu {} leaves no room for payload",
                self.min_mtu
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(RaknetError::InvalidConfig("tick_interval is zero".into()));
        }
        if self.session_stale >= self.session_timeout {
            return Err(RaknetError::InvalidConfig(
                "session_stale must be shorter than session_timeout".into(),
            ));
        }
        if self.max_split_count == 0 || self.max_split_assemblies == 0 {
            return Err(RaknetError::InvalidConfig(
                "split limits must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ServerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_mtu_bounds() {
        let config = ServerConfig {
            min_mtu: 1500,
            max_mtu: 1400,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RaknetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_stale_after_timeout() {
        let config = ServerConfig {
            session_stale: Duration::from_secs(20),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
