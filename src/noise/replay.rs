//! Sliding-window replay protection for transport counters.

use super::REPLAY_WINDOW_SIZE;

const WORDS: usize = REPLAY_WINDOW_SIZE / 64;

/// Tracks which of the last [`REPLAY_WINDOW_SIZE`] counters have been seen.
///
/// Bit `counter % REPLAY_WINDOW_SIZE` records whether `counter` was
/// accepted; bits for counters skipped when the window advances are
/// cleared as it moves.
#[derive(Clone)]
pub struct ReplayWindow {
    bitmap: [u64; WORDS],
    highest: u64,
    seen_any: bool,
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self {
            bitmap: [0; WORDS],
            highest: 0,
            seen_any: false,
        }
    }

    /// Whether `counter` would be accepted. Does not modify the window.
    pub fn check(&self, counter: u64) -> bool {
        if !self.seen_any || counter > self.highest {
            return true;
        }
        if self.highest - counter >= REPLAY_WINDOW_SIZE as u64 {
            return false;
        }
        !self.get(counter)
    }

    /// Record `counter` as seen. Call only after the message authenticated.
    pub fn accept(&mut self, counter: u64) {
        if !self.seen_any {
            self.seen_any = true;
            self.highest = counter;
            self.bitmap = [0; WORDS];
        } else if counter > self.highest {
            let advance = counter - self.highest;
            if advance >= REPLAY_WINDOW_SIZE as u64 {
                self.bitmap = [0; WORDS];
            } else {
                for c in self.highest + 1..counter {
                    self.clear(c);
                }
            }
            self.highest = counter;
        } else if self.highest - counter >= REPLAY_WINDOW_SIZE as u64 {
            return;
        }
        self.set(counter);
    }

    /// Highest counter accepted so far.
    pub fn highest(&self) -> Option<u64> {
        self.seen_any.then_some(self.highest)
    }

    fn slot(counter: u64) -> (usize, u64) {
        let bit = (counter % REPLAY_WINDOW_SIZE as u64) as usize;
        (bit / 64, 1u64 << (bit % 64))
    }

    fn get(&self, counter: u64) -> bool {
        let (word, mask) = Self::slot(counter);
        self.bitmap[word] & mask != 0
    }

    fn set(&mut self, counter: u64) {
        let (word, mask) = Self::slot(counter);
        self.bitmap[word] |= mask;
    }

    fn clear(&mut self, counter: u64) {
        let (word, mask) = Self::slot(counter);
        self.bitmap[word] &= !mask;
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReplayWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayWindow")
            .field("highest", &self.highest())
            .finish()
    }
}
