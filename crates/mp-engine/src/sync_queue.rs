//! Queue of synchronization codes emitted by sync effects.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// Codes reserved up front so typical songs never allocate while rendering.
const INITIAL_CAPACITY: usize = 64;

/// Single-producer/single-consumer queue of sync codes.
///
/// The engine inserts each new code at the front, so a drain yields the
/// newest code first.
#[derive(Clone, Debug)]
pub struct SyncQueue {
    codes: VecDeque<u8>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self {
            codes: VecDeque::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Record a code (low nibble of the effect parameter).
    pub fn push(&mut self, code: u8) {
        self.codes.push_front(code & 0x0f);
    }

    /// Remove and return all queued codes, newest first.
    pub fn drain(&mut self) -> Vec<u8> {
        self.codes.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}
