use bevy_math::IVec3;
use md5::{Digest, Md5};
use rand_xoshiro::Xoroshiro128PlusPlus;
use rand_xoshiro::rand_core::{RngCore, SeedableRng};

use crate::positional::RandomSplitter;
use crate::{Random, block_pos_seed};

const SILVER_RATIO: u64 = 0x6a09e667f3bcc909;
const GOLDEN_RATIO: u64 = 0x9e3779b97f4a7c15;

/// The two 64-bit halves a xoroshiro state is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Seed128 {
    pub lo: u64,
    pub hi: u64,
}

impl Seed128 {
    /// Expands a world seed the way the game does: xor with the silver ratio, then
    /// run both halves through the Stafford 13 finalizer.
    pub fn upgrade(seed: u64) -> Self {
        let lo = seed ^ SILVER_RATIO;
        let hi = lo.wrapping_add(GOLDEN_RATIO);
        Self {
            lo: stafford_13(lo),
            hi: stafford_13(hi),
        }
    }

    /// Big-endian halves of the MD5 digest of `name`.
    pub fn of_name(name: &str) -> Self {
        let digest = Md5::digest(name.as_bytes());
        let (lo, hi) = digest.split_at(8);
        Self {
            lo: u64::from_be_bytes(lo.try_into().unwrap_or_default()),
            hi: u64::from_be_bytes(hi.try_into().unwrap_or_default()),
        }
    }

    pub fn xor(self, other: Seed128) -> Self {
        Self {
            lo: self.lo ^ other.lo,
            hi: self.hi ^ other.hi,
        }
    }
}

fn stafford_13(mut v: u64) -> u64 {
    v = (v ^ v >> 30).wrapping_mul(0xbf58476d1ce4e5b9);
    v = (v ^ v >> 27).wrapping_mul(0x94d049bb133111eb);
    v ^ v >> 31
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XoroshiroRandom(Xoroshiro128PlusPlus);

impl XoroshiroRandom {
    pub fn new(seed: u64) -> Self {
        Self::from_seed128(Seed128::upgrade(seed))
    }

    pub fn from_u128_seed(lo: u64, hi: u64) -> Self {
        Self::from_seed128(Seed128 { lo, hi })
    }

    pub fn from_seed128(seed: Seed128) -> Self {
        // an all-zero state never advances
        let seed = if seed.lo | seed.hi == 0 {
            Seed128 {
                lo: GOLDEN_RATIO,
                hi: SILVER_RATIO,
            }
        } else {
            seed
        };
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&seed.lo.to_le_bytes());
        bytes[8..].copy_from_slice(&seed.hi.to_le_bytes());
        Self(Xoroshiro128PlusPlus::from_seed(bytes))
    }

    fn next_seed128(&mut self) -> Seed128 {
        let lo = self.next_u64();
        let hi = self.next_u64();
        Seed128 { lo, hi }
    }
}

impl Random for XoroshiroRandom {
    fn is_legacy(&self) -> bool {
        false
    }

    fn next_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    /// Lemire's multiply-shift with rejection of the biased low range.
    fn next_u32_bound(&mut self, bound: u32) -> u32 {
        let bound = bound as u64;
        loop {
            let product = self.next_u32() as u64 * bound;
            let low = product & 0xFFFF_FFFF;
            if low >= bound || low >= (bound.wrapping_neg() & 0xFFFF_FFFF) % bound {
                return (product >> 32) as u32;
            }
        }
    }

    fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u32 << 24) as f32
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn fork(&mut self) -> XoroshiroRandom {
        XoroshiroRandom::from_seed128(self.next_seed128())
    }

    fn fork_positional(&mut self) -> RandomSplitter {
        let Seed128 { lo, hi } = self.next_seed128();
        RandomSplitter::Xoroshiro { lo, hi }
    }

    fn fork_at<T>(&mut self, pos: T) -> Self
    where
        T: Into<IVec3>,
    {
        let position = Seed128 {
            lo: block_pos_seed(pos) as u64,
            hi: 0,
        };
        XoroshiroRandom::from_seed128(self.next_seed128().xor(position))
    }

    fn fork_hash(&mut self, name: &str) -> Self {
        let base = self.next_seed128();
        XoroshiroRandom::from_seed128(Seed128::of_name(name).xor(base))
    }
}

impl RngCore for XoroshiroRandom {
    /// Low half of the next long, not the high half `rand_xoshiro` would hand out.
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u64() as u32
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }
}

#[cfg(test)]
mod test {
    use crate::Random;
    use crate::xoroshiro::{Seed128, XoroshiroRandom};

    #[test]
    fn longs_and_ints_share_a_stream() {
        let longs: Vec<i64> = {
            let mut random = XoroshiroRandom::new(1);
            (0..4).map(|_| random.next_i64()).collect()
        };
        assert_eq!(
            longs,
            [
                -1033667707219518978,
                6451672561743293322,
                -1821890263888393630,
                890086654470169703
            ]
        );
        let mut random = XoroshiroRandom::new(1);
        for long in longs {
            assert_eq!(random.next_i32(), long as i32);
        }
        assert_eq!(random.next_i32(), 767430484);
        assert_eq!(random.next_i32(), -2015535141);
    }

    #[test]
    fn bounded_ints() {
        let mut random = XoroshiroRandom::new(1);
        let drawn: Vec<u32> = [25, 256, 255, 254, 0x7FFFFFFF]
            .into_iter()
            .map(|bound| random.next_u32_bound(bound))
            .collect();
        assert_eq!(drawn, [10, 49, 48, 169, 383715241]);
    }

    #[test]
    fn floats_use_the_top_bits() {
        let mut random = XoroshiroRandom::new(1);
        assert_eq!(random.next_f32(), 0.9439647);
        assert_eq!(random.next_f32(), 0.34974587);
        let mut random = XoroshiroRandom::new(1);
        assert_eq!(random.next_f64(), 0.9439647613102243);
        assert_eq!(random.next_f64(), 0.34974587038035987);
        assert_eq!(random.next_f64(), 0.9012351308931007);
    }

    #[test]
    fn zero_seed_still_advances() {
        let mut random = XoroshiroRandom::from_u128_seed(0, 0);
        let first = random.next_i64();
        assert_ne!(first, 0);
        assert_ne!(first, random.next_i64());
    }

    #[test]
    fn name_seeds_are_stable() {
        assert_eq!(Seed128::of_name("minecraft:aquifer"), Seed128::of_name("minecraft:aquifer"));
        assert_ne!(Seed128::of_name("minecraft:aquifer"), Seed128::of_name("minecraft:ore"));
    }

    #[test]
    fn fork_hash_matches_positional_split() {
        let mut a = XoroshiroRandom::new(42);
        let mut b = XoroshiroRandom::new(42);
        let mut forked = a.fork_hash("minecraft:aquifer");
        let mut split = b.fork_positional().from_hash("minecraft:aquifer");
        for _ in 0..4 {
            assert_eq!(forked.next_i64(), split.next_i64());
        }
    }
}
