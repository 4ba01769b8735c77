pub mod legacy;
pub mod positional;
pub mod xoroshiro;

use crate::legacy::LegacyRandom;
use crate::positional::RandomSplitter;
use crate::xoroshiro::XoroshiroRandom;
use bevy_math::IVec3;
use rand_xoshiro::rand_core::RngCore;

pub trait Random: RngCore + Clone {
    fn is_legacy(&self) -> bool;

    fn next_bool(&mut self) -> bool;

    fn next_i32(&mut self) -> i32 {
        self.next_u32() as i32
    }

    fn next_u32_bound(&mut self, bound: u32) -> u32;

    fn next_i32_bound(&mut self, bound: i32) -> i32 {
        self.next_u32_bound(bound as u32) as i32
    }

    fn next_i32_between_inclusive(&mut self, min: i32, max: i32) -> i32 {
        self.next_i32_bound(max - min + 1) + min
    }

    fn next_i64(&mut self) -> i64 {
        self.next_u64() as i64
    }

    fn next_f32(&mut self) -> f32;

    fn next_f64(&mut self) -> f64;

    fn consume(&mut self, count: usize) {
        for _ in 0..count {
            self.next_i32();
        }
    }

    fn fork(&mut self) -> Self;

    /// Splits off a positional factory, consuming state from this random.
    fn fork_positional(&mut self) -> RandomSplitter;

    fn fork_at<T>(&mut self, pos: T) -> Self
    where
        T: Into<IVec3>;

    fn fork_hash(&mut self, name: &str) -> Self;
}

/// Hashes a block position into a seed, the same way for every random kind.
pub fn block_pos_seed<T>(pos: T) -> i64
where
    T: Into<IVec3>,
{
    let pos = pos.into();
    let mut l = (pos.x.wrapping_mul(3129871) as i64)
        ^ (pos.z as i64).wrapping_mul(116129781)
        ^ (pos.y as i64);
    l = l
        .wrapping_mul(l)
        .wrapping_mul(42317861)
        .wrapping_add(l.wrapping_mul(11));
    l >> 16
}

/// `String.hashCode` over UTF-16 code units, used by legacy named forks.
pub fn java_string_hash(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RandomSource {
    Legacy(LegacyRandom),
    Xoroshiro(XoroshiroRandom),
}

impl RandomSource {
    pub fn new(seed: u64, legacy: bool) -> Self {
        if legacy {
            RandomSource::Legacy(LegacyRandom::new(seed))
        } else {
            RandomSource::Xoroshiro(XoroshiroRandom::new(seed))
        }
    }
}

impl RngCore for RandomSource {
    fn next_u32(&mut self) -> u32 {
        match self {
            RandomSource::Legacy(random) => random.next_u32(),
            RandomSource::Xoroshiro(random) => random.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            RandomSource::Legacy(random) => random.next_u64(),
            RandomSource::Xoroshiro(random) => random.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            RandomSource::Legacy(random) => random.fill_bytes(dest),
            RandomSource::Xoroshiro(random) => random.fill_bytes(dest),
        }
    }
}

impl Random for RandomSource {
    fn is_legacy(&self) -> bool {
        matches!(self, RandomSource::Legacy(_))
    }

    fn next_bool(&mut self) -> bool {
        match self {
            RandomSource::Legacy(random) => random.next_bool(),
            RandomSource::Xoroshiro(random) => random.next_bool(),
        }
    }

    fn next_u32_bound(&mut self, bound: u32) -> u32 {
        match self {
            RandomSource::Legacy(random) => random.next_u32_bound(bound),
            RandomSource::Xoroshiro(random) => random.next_u32_bound(bound),
        }
    }

    fn next_f32(&mut self) -> f32 {
        match self {
            RandomSource::Legacy(random) => random.next_f32(),
            RandomSource::Xoroshiro(random) => random.next_f32(),
        }
    }

    fn next_f64(&mut self) -> f64 {
        match self {
            RandomSource::Legacy(random) => random.next_f64(),
            RandomSource::Xoroshiro(random) => random.next_f64(),
        }
    }

    fn fork(&mut self) -> Self {
        match self {
            RandomSource::Legacy(random) => RandomSource::Legacy(random.fork()),
            RandomSource::Xoroshiro(random) => RandomSource::Xoroshiro(random.fork()),
        }
    }

    fn fork_positional(&mut self) -> RandomSplitter {
        match self {
            RandomSource::Legacy(random) => random.fork_positional(),
            RandomSource::Xoroshiro(random) => random.fork_positional(),
        }
    }

    fn fork_at<T>(&mut self, pos: T) -> Self
    where
        T: Into<IVec3>,
    {
        match self {
            RandomSource::Legacy(random) => RandomSource::Legacy(random.fork_at(pos)),
            RandomSource::Xoroshiro(random) => RandomSource::Xoroshiro(random.fork_at(pos)),
        }
    }

    fn fork_hash(&mut self, name: &str) -> Self {
        match self {
            RandomSource::Legacy(random) => RandomSource::Legacy(random.fork_hash(name)),
            RandomSource::Xoroshiro(random) => RandomSource::Xoroshiro(random.fork_hash(name)),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{block_pos_seed, java_string_hash};

    #[test]
    fn block_pos_seed_widens_z() {
        assert_eq!(block_pos_seed((1, 2, 3)), -33674130277896);
        assert_eq!(block_pos_seed((-100, 64, 1000)), -22629515505099);
        assert_eq!(block_pos_seed((100000, 0, -300000)), -110310528170556);
    }

    #[test]
    fn string_hash() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("minecraft:aquifer"), -1973797502);
        assert_eq!(java_string_hash("octave_-4"), 440898198);
    }
}
