use crate::legacy::LegacyRandom;
use crate::xoroshiro::{Seed128, XoroshiroRandom};
use crate::{RandomSource, block_pos_seed, java_string_hash};

/// Derives independent randoms from coordinates or names.
///
/// Same splitter plus same key always yields the same sequence, which is what lets
/// aquifer anchors and surface depths stay stable between runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomSplitter {
    Legacy { seed: i64 },
    Xoroshiro { lo: u64, hi: u64 },
}

impl RandomSplitter {
    pub fn at(&self, x: i32, y: i32, z: i32) -> RandomSource {
        let seed = block_pos_seed((x, y, z));
        match *self {
            RandomSplitter::Legacy { seed: base } => {
                RandomSource::Legacy(LegacyRandom::new((seed ^ base) as u64))
            }
            RandomSplitter::Xoroshiro { lo, hi } => {
                RandomSource::Xoroshiro(XoroshiroRandom::from_u128_seed(seed as u64 ^ lo, hi))
            }
        }
    }

    pub fn from_hash(&self, name: &str) -> RandomSource {
        match *self {
            RandomSplitter::Legacy { seed } => {
                RandomSource::Legacy(LegacyRandom::new((java_string_hash(name) as i64 ^ seed) as u64))
            }
            RandomSplitter::Xoroshiro { lo, hi } => {
                let seed = Seed128::of_name(name).xor(Seed128 { lo, hi });
                RandomSource::Xoroshiro(XoroshiroRandom::from_seed128(seed))
            }
        }
    }

    pub fn from_seed(&self, seed: u64) -> RandomSource {
        match *self {
            RandomSplitter::Legacy { .. } => RandomSource::Legacy(LegacyRandom::new(seed)),
            RandomSplitter::Xoroshiro { lo, hi } => {
                RandomSource::Xoroshiro(XoroshiroRandom::from_u128_seed(seed ^ lo, hi))
            }
        }
    }
}
