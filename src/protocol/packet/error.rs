use thiserror::Error;

/// Errors that may occur while decoding RakNet protocol values or packets.
///
/// This type is kept small and generic so it can be shared by all
/// `RaknetEncodable` implementations, packet bodies and the session layer.
/// A decode failure only ever affects the packet being decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,

    /// A packet ID was not recognised by the registry.
    #[error("Unknown Packet, ID: {0}")]
    UnknownId(u8),

    /// The 16 byte offline marker did not match the RakNet magic.
    #[error("Offline message magic did not match.")]
    InvalidMagic,

    /// An address encoding used an unsupported version field.
    #[error(
        "An invalid IpAddress version was encountered:\n\
        Provided: {0}, expected: 4."
    )]
    InvalidAddrVersion(u8),

    #[error("An unknown reliability value was provided. Reliability byte: {0}")]
    UnknownReliability(u8),

    #[error("Invalid hex string.")]
    InvalidHex,

    /// An ACK/NACK record spans more sequence numbers than we accept.
    #[error("ACK range spans {0} sequence numbers.")]
    AckRangeTooLarge(u32),

    #[error("Split packet declares {0} fragments.")]
    SplitCountTooLarge(u32),

    #[error("Split fragment index {index} out of range for count {count}.")]
    InvalidSplitIndex { index: u32, count: u32 },

    #[error("Split {id} fragment count changed from {expected} to {actual}.")]
    SplitCountMismatch { id: u16, expected: u32, actual: u32 },

    /// Too many partially received split packets for one session.
    #[error("Too many concurrent split assemblies ({0}).")]
    TooManySplitAssemblies(usize),

    #[error("Ordering channel {0} out of range.")]
    InvalidOrderingChannel(u8),

    /// Too many out-of-order packets already held on one channel.
    #[error("Ordering buffer for channel {0} is full.")]
    OrderingBufferFull(u8),

    /// A field implied by the frame flags was not present.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Errors that may occur while encoding RakNet values or packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Only IPv4 addresses have a wire representation here.
    #[error("Address version {0} cannot be encoded.")]
    UnsupportedAddrVersion(u8),

    /// A field implied by the frame flags was not set.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Payload of {0} bytes does not fit the length field.")]
    PayloadTooLarge(usize),
}
