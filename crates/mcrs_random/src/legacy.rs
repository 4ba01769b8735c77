use crate::positional::RandomSplitter;
use crate::{Random, block_pos_seed, java_string_hash};
use bevy_math::IVec3;
use rand_xoshiro::rand_core::{RngCore, impls};

const MODULUS_BITS: usize = 48;
const MODULUS_MASK: u64 = 281474976710655;
const MULTIPLIER: u64 = 25214903917;
const INCREMENT: u64 = 11;
const F32_MULTIPLIER: f32 = 5.9604645E-8;
const F64_MULTIPLIER: f32 = 1.110223E-16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRandom {
    pub seed: u64,
}

impl LegacyRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed: (seed ^ MULTIPLIER) & MODULUS_MASK,
        }
    }

    #[inline]
    fn advance(&mut self) {
        self.seed = self.seed.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT) & MODULUS_MASK;
    }

    /// Top `bits` of the next state, sign-extended the way a 32-bit int would be.
    fn next_bits(&mut self, bits: usize) -> i32 {
        self.advance();
        (self.seed >> (MODULUS_BITS - bits)) as i64 as i32
    }
}

impl RngCore for LegacyRandom {
    fn next_u32(&mut self) -> u32 {
        self.next_bits(32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_bits(32) as i64;
        let lo = self.next_bits(32) as i64;
        (hi << 32).wrapping_add(lo) as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }
}

impl Random for LegacyRandom {
    fn is_legacy(&self) -> bool {
        true
    }

    fn next_bool(&mut self) -> bool {
        self.next_bits(1) != 0
    }

    fn next_u32_bound(&mut self, bound: u32) -> u32 {
        let bound = bound as i32;
        if (bound & bound.wrapping_sub(1)) == 0 {
            let n = self.next_bits(31) as i64;
            return ((bound as i64).wrapping_mul(n) >> 31) as u32;
        }
        loop {
            let a = self.next_bits(31);
            let b = a % bound;
            if a.wrapping_sub(b).wrapping_add(bound - 1) >= 0 {
                return b as u32;
            }
        }
    }

    fn next_f32(&mut self) -> f32 {
        self.next_bits(24) as f32 * F32_MULTIPLIER
    }

    fn next_f64(&mut self) -> f64 {
        let hi = self.next_bits(26) as i64;
        let lo = self.next_bits(27) as i64;
        ((hi << 27) + lo) as f64 * F64_MULTIPLIER as f64
    }

    fn fork(&mut self) -> Self {
        LegacyRandom::new(self.next_u64())
    }

    fn fork_positional(&mut self) -> RandomSplitter {
        RandomSplitter::Legacy {
            seed: self.next_i64(),
        }
    }

    fn fork_at<T>(&mut self, pos: T) -> Self
    where
        T: Into<IVec3>,
    {
        LegacyRandom::new((self.next_i64() ^ block_pos_seed(pos)) as u64)
    }

    fn fork_hash(&mut self, name: &str) -> Self {
        LegacyRandom::new((self.next_i64() ^ java_string_hash(name) as i64) as u64)
    }
}
