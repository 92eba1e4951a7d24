// The xorshift128+ generator as shipped by V8, SpiderMonkey and JavaScriptCore.
//
// Shift triple (23, 17, 26) from Vigna, "Further scramblings of Marsaglia's
// xorshift generators" (2017), which is what all three engines use.

use core::fmt;
use rand_core::{impls, le, Error, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

pub const SHIFT_A: u32 = 23;
pub const SHIFT_B: u32 = 17;
pub const SHIFT_C: u32 = 26;

/// The 128 bits of generator state as an ordered pair of words.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneratorState {
    pub state0: u64,
    pub state1: u64,
}

impl GeneratorState {
    pub const fn new(state0: u64, state1: u64) -> Self {
        GeneratorState { state0, state1 }
    }

    /// One xorshift128+ transition.
    #[inline]
    #[must_use]
    pub fn forward(self) -> Self {
        let mut x = self.state0;
        x ^= x << SHIFT_A;
        x ^= x >> SHIFT_B;
        x ^= self.state1;
        x ^= self.state1 >> SHIFT_C;
        GeneratorState {
            state0: self.state1,
            state1: x,
        }
    }

    /// Inverse of [`GeneratorState::forward`].
    ///
    /// `x ^= x >> 17` is undone by folding in every multiple of 17 below the
    /// word width (17, 34, 51), and `x ^= x << 23` likewise with (23, 46).
    #[inline]
    #[must_use]
    pub fn backward(self) -> Self {
        let previous1 = self.state0;
        let mut x = self.state1 ^ previous1 ^ (previous1 >> SHIFT_C);
        x ^= (x >> SHIFT_B) ^ (x >> (2 * SHIFT_B)) ^ (x >> (3 * SHIFT_B));
        x ^= (x << SHIFT_A) ^ (x << (2 * SHIFT_A));
        GeneratorState {
            state0: x,
            state1: previous1,
        }
    }

    /// `state0 + state1`, the raw forward-order output.
    #[inline]
    pub fn sum(self) -> u64 {
        self.state0.wrapping_add(self.state1)
    }
}

impl fmt::Debug for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "GeneratorState {{ state0: {:#018x}, state1: {:#018x} }}", self.state0, self.state1)
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:#018x}, {:#018x})", self.state0, self.state1)
    }
}

/// A reference xorshift128+ generator.
///
/// `next_u64` steps first and then returns `state0 + state1`, which is the
/// word SpiderMonkey and JavaScriptCore reduce to a double. V8 instead reads
/// `state0` of the stepped state; see [`crate::convention::OutputRule`].
#[derive(Clone, PartialEq, Eq)]
pub struct Xorshift128Plus {
    state: GeneratorState
}

impl Xorshift128Plus {
    pub fn from_state(state: GeneratorState) -> Self {
        Xorshift128Plus { state }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    #[inline]
    fn step(&mut self) {
        self.state = self.state.forward();
    }
}

// Custom Debug implementation that does not expose the internal state
impl fmt::Debug for Xorshift128Plus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Xorshift128Plus {{}}")
    }
}

impl RngCore for Xorshift128Plus {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.step();
        self.state.sum()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Xorshift128Plus {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let mut words = [0u64; 2];
        le::read_u64_into(&seed, &mut words);
        // The all-zero state is a fixed point.
        if words == [0, 0] {
            words[1] = 1;
        }
        Xorshift128Plus::from_state(GeneratorState::new(words[0], words[1]))
    }
}
