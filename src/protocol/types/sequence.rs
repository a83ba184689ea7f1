use std::cmp::Ordering;

use bytes::{Buf, BufMut};

use crate::protocol::{
    packet::{DecodeError, EncodeError, RaknetEncodable},
    types::U24LE,
};

const MODULO: u32 = 1 << 24;
const MASK: u32 = MODULO - 1;
const HALF: u32 = MODULO / 2;

/// Sequence type for a U24, compared with wrap-around (serial number) semantics.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Sequence24(u32);

impl Sequence24 {
    pub const ZERO: Sequence24 = Sequence24(0);

    pub fn new(v: u32) -> Sequence24 {
        Sequence24(v & MASK)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    // clone mutations.

    pub fn next(&self) -> Sequence24 {
        Sequence24::new(self.0.wrapping_add(1))
    }

    pub fn prev(&self) -> Sequence24 {
        Sequence24::new(self.0.wrapping_sub(1))
    }

    /// Forward distance from `self` to `other`, modulo 2^24.
    pub fn distance_to(&self, other: Sequence24) -> u32 {
        other.0.wrapping_sub(self.0) & MASK
    }

    /// Returns the value and advances `self` by one.
    pub fn fetch_next(&mut self) -> Sequence24 {
        let current = *self;
        *self = self.next();
        current
    }
}

impl Ord for Sequence24 {
    fn cmp(&self, other: &Self) -> Ordering {
        match other.distance_to(*self) {
            0 => Ordering::Equal,
            d if d < HALF => Ordering::Greater,
            _ => Ordering::Less,
        }
    }
}

impl PartialOrd for Sequence24 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<Sequence24> for U24LE {
    fn from(seq: Sequence24) -> Self {
        U24LE(seq.value())
    }
}

impl From<U24LE> for Sequence24 {
    fn from(raw: U24LE) -> Self {
        Sequence24::new(raw.0)
    }
}

impl RaknetEncodable for Sequence24 {
    fn encode_raknet(&self, dst: &mut impl BufMut) -> Result<(), EncodeError> {
        U24LE::from(*self).encode_raknet(dst)
    }

    fn decode_raknet(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(U24LE::decode_raknet(src)?.into())
    }
}
