//! Randomness providers used when shuffling flips.
//!
//! Flip permutations decide which images end up in the public payload, so
//! production draws must come from the operating system CSPRNG.  The
//! [`RandomSource`] seam exists so tests and replays can script the draws;
//! no seeded generator is exposed.

use rand::rngs::OsRng;
use rand_core::RngCore;
use std::collections::VecDeque;

/// A source of uniformly distributed 32-bit words.
pub trait RandomSource {
    /// Returns the next 32-bit draw.
    fn next_u32(&mut self) -> u32;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn next_u32(&mut self) -> u32 {
        OsRng.next_u32()
    }
}

/// Replays a fixed list of draws, cycling once exhausted.
///
/// Intended for tests and for reproducing a recorded authoring session.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    draws: VecDeque<u32>,
}

impl ScriptedRandom {
    /// Creates a source that yields `draws` in order, cycling.  An empty
    /// script yields zeros.
    pub fn new(draws: impl IntoIterator<Item = u32>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_u32(&mut self) -> u32 {
        let value = self.draws.pop_front().unwrap_or_default();
        self.draws.push_back(value);
        value
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_u32(&mut self) -> u32 {
        (**self).next_u32()
    }
}
