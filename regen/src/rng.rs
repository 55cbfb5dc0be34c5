//! Pure random sources for deterministic generation.
//!
//! A [`RandomSource`] never mutates itself. Every draw takes the current state
//! and returns the next state together with the drawn value, so replaying a
//! generation only requires keeping the starting source around.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// A stateless supply of random values
pub trait RandomSource: Clone {
    /// Draw a uniformly distributed 64-bit value
    fn draw_long(&self) -> (Self, i64);

    /// Draw a value in the half-open range `lo..hi`
    ///
    /// An empty range yields `lo` and leaves the source untouched.
    fn draw_int(&self, lo: usize, hi: usize) -> (Self, usize) {
        if hi <= lo {
            return (self.clone(), lo);
        }
        let (next, value) = self.draw_long();
        let span = (hi - lo) as u64;
        (next, lo + (value.unsigned_abs() % span) as usize)
    }
}

const MULTIPLIER: i64 = 0x5DEE_CE66D;
const ADDEND: i64 = 0xB;
const MASK: i64 = (1 << 48) - 1;

/// 48-bit linear congruential generator with the `java.util.Random` constants
///
/// Seeding and every draw follow that generator bit for bit, so a seed
/// reproduces the same sequence on any platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lcg {
    state: i64,
}

impl Lcg {
    pub fn new(seed: i64) -> Self {
        Self {
            state: (seed ^ MULTIPLIER) & MASK,
        }
    }

    /// The scrambled 48-bit internal state
    pub fn state(&self) -> i64 {
        self.state
    }

    fn next_bits(self, bits: u32) -> (Self, i32) {
        let state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(ADDEND)
            & MASK;
        (Self { state }, (state >> (48 - bits)) as i32)
    }

    /// `nextInt(bound)` for a positive 32-bit bound
    fn bounded(self, bound: i32) -> (Self, i32) {
        if bound & bound.wrapping_neg() == bound {
            let (next, bits) = self.next_bits(31);
            return (next, ((bound as i64 * bits as i64) >> 31) as i32);
        }
        let mut source = self;
        loop {
            let (next, bits) = source.next_bits(31);
            source = next;
            let value = bits % bound;
            if bits.wrapping_sub(value).wrapping_add(bound - 1) >= 0 {
                return (source, value);
            }
        }
    }
}

impl RandomSource for Lcg {
    fn draw_long(&self) -> (Self, i64) {
        let (next, high) = self.next_bits(32);
        let (next, low) = next.next_bits(32);
        (next, ((high as i64) << 32).wrapping_add(low as i64))
    }

    fn draw_int(&self, lo: usize, hi: usize) -> (Self, usize) {
        if hi <= lo {
            return (*self, lo);
        }
        match i32::try_from(hi - lo) {
            Ok(bound) => {
                let (next, value) = self.bounded(bound);
                (next, lo + value as usize)
            }
            Err(_) => {
                let (next, value) = self.draw_long();
                let span = (hi - lo) as u64;
                (next, lo + (value.unsigned_abs() % span) as usize)
            }
        }
    }
}

/// Adapter over a `rand` generator
///
/// Each draw clones the wrapped generator, so the source itself stays a value.
/// Sequences seeded from entropy are not reproducible across processes; use
/// [`Lcg`] whenever the output has to be regenerated for shrinking.
#[derive(Debug, Clone)]
pub struct HostRandom<R = StdRng> {
    rng: R,
}

impl HostRandom<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore + Clone> HostRandom<R> {
    /// Wrap any cloneable `rand` generator
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + Clone> RandomSource for HostRandom<R> {
    fn draw_long(&self) -> (Self, i64) {
        let mut rng = self.rng.clone();
        let value = rng.next_u64() as i64;
        (Self { rng }, value)
    }

    fn draw_int(&self, lo: usize, hi: usize) -> (Self, usize) {
        if hi <= lo {
            return (self.clone(), lo);
        }
        let mut rng = self.rng.clone();
        let value = rng.gen_range(lo..hi);
        (Self { rng }, value)
    }
}
