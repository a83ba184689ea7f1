//! Reassembly of split (fragmented) encapsulated packets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::protocol::{encapsulated_packet::EncapsulatedPacket, packet::DecodeError};

#[derive(Debug)]
struct SplitEntry {
    fragments: Vec<Option<Bytes>>,
    received: u32,
    first_seen: Instant,
}

#[derive(Debug)]
pub struct SplitAssembler {
    entries: HashMap<u16, SplitEntry>,
    max_assemblies: usize,
    max_count: u32,
}

impl SplitAssembler {
    pub fn new(max_assemblies: usize, max_count: u32) -> Self {
        Self {
            entries: HashMap::new(),
            max_assemblies,
            max_count,
        }
    }

    /// Assemblies currently waiting for fragments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feeds one packet in. Unsplit packets come straight back; fragments are
    /// held until the last one arrives, then the whole payload is returned
    /// with the metadata of the completing fragment and no split info.
    pub fn add(
        &mut self,
        enc: EncapsulatedPacket,
        now: Instant,
    ) -> Result<Option<EncapsulatedPacket>, DecodeError> {
        let Some(split) = enc.split else {
            return Ok(Some(enc));
        };
        if split.count == 0 || split.count > self.max_count {
            return Err(DecodeError::SplitCountTooLarge(split.count));
        }
        if split.index >= split.count {
            return Err(DecodeError::InvalidSplitIndex {
                index: split.index,
                count: split.count,
            });
        }

        if !self.entries.contains_key(&split.id) && self.entries.len() >= self.max_assemblies {
            return Err(DecodeError::TooManySplitAssemblies(self.max_assemblies));
        }
        let entry = self.entries.entry(split.id).or_insert_with(|| SplitEntry {
            fragments: vec![None; split.count as usize],
            received: 0,
            first_seen: now,
        });
        if entry.fragments.len() != split.count as usize {
            return Err(DecodeError::SplitCountMismatch {
                id: split.id,
                expected: entry.fragments.len() as u32,
                actual: split.count,
            });
        }

        let slot = &mut entry.fragments[split.index as usize];
        if slot.is_none() {
            *slot = Some(enc.payload.clone());
            entry.received += 1;
        }
        if entry.received < split.count {
            return Ok(None);
        }

        let Some(entry) = self.entries.remove(&split.id) else {
            return Ok(None);
        };
        let total = entry.fragments.iter().flatten().map(Bytes::len).sum();
        let mut payload = BytesMut::with_capacity(total);
        for fragment in entry.fragments.into_iter().flatten() {
            payload.extend_from_slice(&fragment);
        }

        Ok(Some(EncapsulatedPacket {
            split: None,
            payload: payload.freeze(),
            ..enc
        }))
    }

    /// Drops assemblies older than `timeout`, returning how many went.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.first_seen) < timeout);
        before - self.entries.len()
    }
}
