//! Receive-side bookkeeping for 24-bit sequence spaces.
//!
//! Used twice per session: once for datagram sequence numbers (what to ACK
//! and NACK) and once for reliable message indices (duplicate filtering).

use std::collections::HashSet;

use crate::protocol::types::Sequence24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    New,
    Duplicate,
    /// Too far ahead of the contiguous watermark to track.
    OutOfWindow,
}

#[derive(Debug)]
pub struct SequenceWindow {
    /// Lowest sequence number not yet received; everything below it has been.
    next_expected: Sequence24,
    /// Highest sequence number received so far.
    highest: Option<Sequence24>,
    /// Received numbers above the watermark.
    ahead: HashSet<u32>,
    max_ahead: u32,
}

impl SequenceWindow {
    pub fn new(max_ahead: u32) -> Self {
        Self {
            next_expected: Sequence24::ZERO,
            highest: None,
            ahead: HashSet::new(),
            max_ahead,
        }
    }

    pub fn next_expected(&self) -> Sequence24 {
        self.next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.ahead.len()
    }

    pub fn insert(&mut self, seq: Sequence24) -> Receipt {
        if seq < self.next_expected {
            return Receipt::Duplicate;
        }
        if self.next_expected.distance_to(seq) >= self.max_ahead {
            return Receipt::OutOfWindow;
        }
        if self.highest.is_none_or(|h| seq > h) {
            self.highest = Some(seq);
        }
        if seq != self.next_expected {
            return if self.ahead.insert(seq.value()) {
                Receipt::New
            } else {
                Receipt::Duplicate
            };
        }
        self.next_expected = self.next_expected.next();
        while self.ahead.remove(&self.next_expected.value()) {
            self.next_expected = self.next_expected.next();
        }
        Receipt::New
    }

    /// Like [`insert`](Self::insert), but also returns the numbers skipped
    /// between the previous highest and `seq`, which are NACK candidates.
    pub fn insert_with_gaps(&mut self, seq: Sequence24) -> (Receipt, Vec<Sequence24>) {
        let previous = self.highest;
        let receipt = self.insert(seq);
        if receipt != Receipt::New {
            return (receipt, Vec::new());
        }
        let from = match previous {
            Some(h) if seq > h => h.next(),
            Some(_) => return (receipt, Vec::new()),
            None => Sequence24::ZERO,
        };
        let gaps = (0..from.distance_to(seq))
            .map(|i| Sequence24::new(from.value().wrapping_add(i)))
            .filter(|s| *s >= self.next_expected && !self.ahead.contains(&s.value()))
            .collect();
        (receipt, gaps)
    }
}
