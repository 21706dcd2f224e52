//! Sources of random numbers.
//!
//! Query IDs must be unpredictable to make spoofing responses hard. The
//! dispatcher therefore draws them, as well as its other random values,
//! from a [`RandomSource`] that can be replaced for testing.

use rand::{Rng, RngCore};

//------------ RandomSource --------------------------------------------------

/// A source of random numbers.
pub trait RandomSource: Send + Sync {
    /// Returns a random 16 bit value.
    fn next_u16(&self) -> u16;

    /// Returns a random value less than `bound`.
    ///
    /// Returns zero if `bound` is zero.
    fn below(&self, bound: u64) -> u64;

    /// Fills `buf` with random octets.
    fn fill(&self, buf: &mut [u8]);
}

//------------ ThreadRandom --------------------------------------------------

/// Random numbers from the thread-local generator of the `rand` crate.
///
/// This generator is cryptographically secure and periodically reseeded
/// from the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u16(&self) -> u16 {
        rand::thread_rng().gen()
    }

    fn below(&self, bound: u64) -> u64 {
        if bound == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..bound)
        }
    }

    fn fill(&self, buf: &mut [u8]) {
        rand::thread_rng().fill_bytes(buf)
    }
}

//============ Testing =======================================================
