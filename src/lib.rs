//! A RakNet-compatible session transport.
//!
//! Turns an unreliable, unordered UDP channel into sessions with optional
//! reliability, ordering and fragmentation:
//!
//! - [`protocol`]: the binary codec, offline handshake packets and datagram
//!   framing.
//! - [`session`]: per-peer reliability state and the [`SessionManager`]
//!   that dispatches inbound packets and drives periodic maintenance.
//! - [`transport`]: a tokio UDP listener built on the session manager.

pub mod config;
mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::ServerConfig;
pub use error::RaknetError;
pub use protocol::reliability::Reliability;
pub use protocol::state::DisconnectReason;
pub use session::manager::{SessionEvent, SessionManager};
pub use transport::{Message, PacketSink, RaknetConnection, RaknetListener};
