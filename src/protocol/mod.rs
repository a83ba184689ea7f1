//! RakNet protocol primitives, packets, frames and related state.
//!
//! This module houses constants, the binary codec, packet definitions and
//! the datagram framing used by the higher–level session layer.

pub mod ack;
pub mod constants;
pub mod cursor;
pub mod datagram;
pub mod encapsulated_packet;
pub mod frame;
pub mod packet;
pub mod reliability;
pub mod state;
pub mod types;
