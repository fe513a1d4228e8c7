//! Anti-replay sliding window for incoming ESP sequence numbers.

use crate::core::{CryptoError, REPLAY_WINDOW_SIZE};

const WORDS: usize = REPLAY_WINDOW_SIZE / 64;

/// Anti-replay sliding window.
///
/// - Below window: reject
/// - Seen sequence: reject
/// - Above highest: advance the window
///
/// The window is consulted before decryption and only updated once the
/// packet has authenticated.
#[derive(Debug, Clone)]
pub struct ReplayWindow {
    /// Bit `i` set means `highest - i` has been seen.
    bitmap: [u64; WORDS],
    /// Highest sequence seen so far.
    highest: u32,
    /// Whether any packet has been accepted yet.
    initialized: bool,
}

impl ReplayWindow {
    /// Create an empty replay window.
    pub fn new() -> Self {
        Self {
            bitmap: [0; WORDS],
            highest: 0,
            initialized: false,
        }
    }

    /// Next sequence number expected from the peer (highest seen + 1).
    pub fn next_expected(&self) -> u64 {
        if self.initialized {
            u64::from(self.highest) + 1
        } else {
            0
        }
    }

    /// Check a sequence number without updating the window.
    pub fn check(&self, seq: u32) -> Result<(), CryptoError> {
        if !self.initialized || seq > self.highest {
            return Ok(());
        }
        let diff = (self.highest - seq) as usize;
        if diff >= REPLAY_WINDOW_SIZE || self.bit(diff) {
            return Err(CryptoError::ReplayDetected(seq));
        }
        Ok(())
    }

    /// Check a sequence number and mark it as seen.
    pub fn check_and_update(&mut self, seq: u32) -> Result<(), CryptoError> {
        self.check(seq)?;

        if !self.initialized {
            self.highest = seq;
            self.initialized = true;
        } else if seq > self.highest {
            self.shift_window((seq - self.highest) as usize);
            self.highest = seq;
        }
        let diff = (self.highest - seq) as usize;
        self.set_bit(diff);
        Ok(())
    }

    fn bit(&self, index: usize) -> bool {
        self.bitmap[index / 64] & (1 << (index % 64)) != 0
    }

    fn set_bit(&mut self, index: usize) {
        self.bitmap[index / 64] |= 1 << (index % 64);
    }

    /// Shift the window towards older positions by `shift` bits.
    fn shift_window(&mut self, shift: usize) {
        if shift >= REPLAY_WINDOW_SIZE {
            self.bitmap = [0; WORDS];
            return;
        }

        let shift_words = shift / 64;
        let shift_bits = (shift % 64) as u32;

        if shift_words > 0 {
            for i in (shift_words..WORDS).rev() {
                self.bitmap[i] = self.bitmap[i - shift_words];
            }
            for word in self.bitmap.iter_mut().take(shift_words) {
                *word = 0;
            }
        }

        if shift_bits > 0 {
            let mut carry = 0u64;
            for word in self.bitmap.iter_mut() {
                let new_carry = *word >> (64 - shift_bits);
                *word = (*word << shift_bits) | carry;
                carry = new_carry;
            }
        }
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new()
    }
}
