//! Growable byte buffer with a read/write offset.
//!
//! `ByteCursor` is the sequential view the session manager decodes inbound
//! frames from and encodes outbound frames into. Reads go through the
//! [`Buf`] implementation, so every `RaknetEncodable` type reads straight
//! from a cursor; writes always append and move the offset to the new end.

use std::net::SocketAddr;

use bytes::{Buf, Bytes, BytesMut};

use crate::protocol::{
    packet::{DecodeError, EncodeError, RaknetEncodable},
    types::{F32LE, F64LE, I16LE, I32LE, Magic, U16LE, U24, U24LE},
};

#[derive(Debug, Clone, Default)]
pub struct ByteCursor {
    buf: BytesMut,
    offset: usize,
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            offset: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining_bytes(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// True once the offset has reached the end of the buffer.
    pub fn feof(&self) -> bool {
        self.offset >= self.buf.len()
    }

    /// Drops all content.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.offset = 0;
    }

    /// Rewinds the offset so the buffer can be read from the start.
    pub fn flip(&mut self) -> &mut Self {
        self.offset = 0;
        self
    }

    pub fn append(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self.offset = self.buf.len();
        self
    }

    /// Appends bytes given as a hex string, two characters per byte.
    pub fn append_hex(&mut self, hex: &str) -> Result<&mut Self, DecodeError> {
        let bytes = hex::decode(hex).map_err(|_| DecodeError::InvalidHex)?;
        Ok(self.append(&bytes))
    }

    /// Appends whatever `encode` writes. On failure the partial write is
    /// discarded.
    pub fn append_with<F>(&mut self, encode: F) -> Result<&mut Self, EncodeError>
    where
        F: FnOnce(&mut BytesMut) -> Result<(), EncodeError>,
    {
        let start = self.buf.len();
        if let Err(e) = encode(&mut self.buf) {
            self.buf.truncate(start);
            return Err(e);
        }
        self.offset = self.buf.len();
        Ok(self)
    }

    pub fn write<T: RaknetEncodable>(&mut self, value: &T) -> Result<&mut Self, EncodeError> {
        self.append_with(|dst| value.encode_raknet(dst))
    }

    pub fn read<T: RaknetEncodable>(&mut self) -> Result<T, DecodeError> {
        T::decode_raknet(self)
    }

    /// Takes everything from the offset to the end.
    pub fn read_remaining(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.buf[self.offset..]);
        self.offset = self.buf.len();
        rest
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        if self.remaining_bytes() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(self.copy_to_bytes(len))
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.read()
    }

    pub fn write_u8(&mut self, v: u8) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.read()
    }

    pub fn write_bool(&mut self, v: bool) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.read()
    }

    pub fn write_u16(&mut self, v: u16) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        Ok(self.read::<U16LE>()?.0)
    }

    pub fn write_u16_le(&mut self, v: u16) -> Result<&mut Self, EncodeError> {
        self.write(&U16LE(v))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.read()
    }

    pub fn write_i16(&mut self, v: i16) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, DecodeError> {
        Ok(self.read::<I16LE>()?.0)
    }

    pub fn write_i16_le(&mut self, v: i16) -> Result<&mut Self, EncodeError> {
        self.write(&I16LE(v))
    }

    pub fn read_triad(&mut self) -> Result<u32, DecodeError> {
        Ok(self.read::<U24>()?.0)
    }

    pub fn write_triad(&mut self, v: u32) -> Result<&mut Self, EncodeError> {
        self.write(&U24(v))
    }

    pub fn read_triad_le(&mut self) -> Result<u32, DecodeError> {
        Ok(self.read::<U24LE>()?.0)
    }

    pub fn write_triad_le(&mut self, v: u32) -> Result<&mut Self, EncodeError> {
        self.write(&U24LE(v))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.read()
    }

    pub fn write_i32(&mut self, v: i32) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read::<I32LE>()?.0)
    }

    pub fn write_i32_le(&mut self, v: i32) -> Result<&mut Self, EncodeError> {
        self.write(&I32LE(v))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.read()
    }

    pub fn write_u32(&mut self, v: u32) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    /// 64-bit big-endian, high word first.
    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.read()
    }

    pub fn write_u64(&mut self, v: u64) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.read()
    }

    pub fn write_f32(&mut self, v: f32) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_f32_le(&mut self) -> Result<f32, DecodeError> {
        Ok(self.read::<F32LE>()?.0)
    }

    pub fn write_f32_le(&mut self, v: f32) -> Result<&mut Self, EncodeError> {
        self.write(&F32LE(v))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.read()
    }

    pub fn write_f64(&mut self, v: f64) -> Result<&mut Self, EncodeError> {
        self.write(&v)
    }

    pub fn read_f64_le(&mut self) -> Result<f64, DecodeError> {
        Ok(self.read::<F64LE>()?.0)
    }

    pub fn write_f64_le(&mut self, v: f64) -> Result<&mut Self, EncodeError> {
        self.write(&F64LE(v))
    }

    pub fn read_address(&mut self) -> Result<SocketAddr, DecodeError> {
        self.read()
    }

    pub fn write_address(&mut self, addr: &SocketAddr) -> Result<&mut Self, EncodeError> {
        self.write(addr)
    }

    pub fn read_magic(&mut self) -> Result<Magic, DecodeError> {
        self.read()
    }
}

impl Buf for ByteCursor {
    fn remaining(&self) -> usize {
        self.remaining_bytes()
    }

    fn chunk(&self) -> &[u8] {
        &self.buf[self.offset..]
    }

    fn advance(&mut self, cnt: usize) {
        self.offset = (self.offset + cnt).min(self.buf.len());
    }
}

impl From<&[u8]> for ByteCursor {
    fn from(bytes: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(bytes),
            offset: 0,
        }
    }
}

impl From<Vec<u8>> for ByteCursor {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(bytes.as_slice())
    }
}
