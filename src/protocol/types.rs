use crate::protocol::constants::DEFAULT_UNCONNECTED_MAGIC;
use crate::protocol::packet::{DecodeError, EncodeError, RaknetEncodable};
use bytes::{Buf, BufMut, Bytes};
use std::{
    mem,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Duration,
};

mod datagram_header;
mod encapsulated_packet_header;
mod sequence;

pub use datagram_header::DatagramHeader;
pub use encapsulated_packet_header::EncapsulatedPacketHeader;
pub use sequence::Sequence24;

pub type Magic = [u8; 16];

macro_rules! impl_raknet_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl RaknetEncodable for $ty {
            fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
                dst.$put(*self);
                Ok(())
            }

            fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if src.remaining() < mem::size_of::<$ty>() {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get())
            }
        }
    };
}

/// Little-endian wrappers; the bare types above are big-endian.
macro_rules! impl_raknet_le {
    ($name:ident, $ty:ty, $put:ident, $get:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name(pub $ty);

        impl RaknetEncodable for $name {
            fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
                dst.$put(self.0);
                Ok(())
            }

            fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if src.remaining() < mem::size_of::<$ty>() {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok($name(src.$get()))
            }
        }
    };
}

impl_raknet_int!(u8, put_u8, get_u8);
impl_raknet_int!(i8, put_i8, get_i8);

// Big-endian ints:
impl_raknet_int!(u16, put_u16, get_u16);
impl_raknet_int!(u32, put_u32, get_u32);
impl_raknet_int!(u64, put_u64, get_u64);
impl_raknet_int!(i16, put_i16, get_i16);
impl_raknet_int!(i32, put_i32, get_i32);
impl_raknet_int!(i64, put_i64, get_i64);
impl_raknet_int!(f32, put_f32, get_f32);
impl_raknet_int!(f64, put_f64, get_f64);

impl_raknet_le!(U16LE, u16, put_u16_le, get_u16_le);
impl_raknet_le!(I16LE, i16, put_i16_le, get_i16_le);
impl_raknet_le!(I32LE, i32, put_i32_le, get_i32_le);
impl_raknet_le!(F32LE, f32, put_f32_le, get_f32_le);
impl_raknet_le!(F64LE, f64, put_f64_le, get_f64_le);

/// 3-byte big-endian integer ("triad").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U24(pub u32);

impl RaknetEncodable for U24 {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_uint(u64::from(self.0 & 0x00FF_FFFF), 3);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 3 {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(U24(src.get_uint(3) as u32))
    }
}

/// 3-byte little-endian integer, used for sequence and message indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U24LE(pub u32);

impl RaknetEncodable for U24LE {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        let v = self.0;
        dst.put_u8((v & 0xFF) as u8);
        dst.put_u8(((v >> 8) & 0xFF) as u8);
        dst.put_u8(((v >> 16) & 0xFF) as u8);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < 3 {
            return Err(DecodeError::UnexpectedEof);
        }
        let b0 = src.get_u8() as u32;
        let b1 = src.get_u8() as u32;
        let b2 = src.get_u8() as u32;
        Ok(U24LE(b0 | (b1 << 8) | (b2 << 16)))
    }
}

impl RaknetEncodable for bool {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_u8(u8::from(*self));
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8() != 0)
    }
}

impl RaknetEncodable for Magic {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_slice(self);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < mem::size_of::<Self>() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut magic = [0u8; 16];
        src.copy_to_slice(&mut magic);
        Ok(magic)
    }
}

/// Returns true when `window` is exactly the offline message magic.
pub fn verify_magic(window: &[u8]) -> bool {
    window == DEFAULT_UNCONNECTED_MAGIC
}

/// Reads the 16 byte magic window and rejects the packet on mismatch.
pub fn read_magic(src: &mut impl Buf) -> Result<(), DecodeError> {
    let magic = Magic::decode_raknet(src)?;
    if !verify_magic(&magic) {
        return Err(DecodeError::InvalidMagic);
    }
    Ok(())
}

pub fn write_magic(dst: &mut impl BufMut) -> Result<(), EncodeError> {
    DEFAULT_UNCONNECTED_MAGIC.encode_raknet(dst)
}

/// Pong payload; a `u16` length prefix followed by the bytes.
#[derive(Debug, Clone)]
pub struct Advertisement(pub Option<Bytes>);

impl RaknetEncodable for Advertisement {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        if let Some(ad_bytes) = &self.0
            && !ad_bytes.is_empty()
        {
            let len = u16::try_from(ad_bytes.len())
                .map_err(|_| EncodeError::PayloadTooLarge(ad_bytes.len()))?;
            dst.put_u16(len);
            dst.put_slice(ad_bytes);
        }
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            // No data left, so the field was omitted
            return Ok(Advertisement(None));
        }
        if src.remaining() < 2 {
            return Err(DecodeError::UnexpectedEof);
        }
        let len = src.get_u16() as usize;
        if src.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(Advertisement(Some(src.copy_to_bytes(len))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaknetTime(pub u64); // ms on wire

impl RaknetEncodable for RaknetTime {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        self.0.encode_raknet(dst)
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode_raknet(src)?))
    }
}

impl From<RaknetTime> for Duration {
    fn from(value: RaknetTime) -> Self {
        Duration::from_millis(value.0)
    }
}

impl From<Duration> for RaknetTime {
    fn from(value: Duration) -> Self {
        RaknetTime(value.as_millis() as u64)
    }
}

/// End of Buffer Padding, adds any length padding till the
/// end of it. So doesn't send any prepadding length or etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EoBPadding(pub usize);

impl RaknetEncodable for EoBPadding {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        dst.put_bytes(0, self.0);
        Ok(())
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = src.remaining();
        src.advance(len);
        Ok(EoBPadding(len))
    }
}

/// Only version 4 has a wire form; the octets travel bit-inverted.
impl RaknetEncodable for SocketAddr {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        match self {
            SocketAddr::V4(addr) => {
                dst.put_u8(4);
                let ip = addr.ip().octets();
                dst.put_slice(&[!ip[0], !ip[1], !ip[2], !ip[3]]);
                dst.put_u16(addr.port());
                Ok(())
            }
            SocketAddr::V6(_) => Err(EncodeError::UnsupportedAddrVersion(6)),
        }
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let version = u8::decode_raknet(src)?;
        if version != 4 {
            return Err(DecodeError::InvalidAddrVersion(version));
        }
        // 4 IP bytes + 2 port bytes
        if src.remaining() < 4 + 2 {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut ip = [0u8; 4];
        src.copy_to_slice(&mut ip);
        let port = src.get_u16();
        Ok(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::new(!ip[0], !ip[1], !ip[2], !ip[3]),
            port,
        )))
    }
}
