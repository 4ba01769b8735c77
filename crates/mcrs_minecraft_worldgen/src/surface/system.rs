use crate::block::BlockState;
use crate::error::Result;
use crate::noise::normal_noise::NormalNoise;
use crate::random_state::RandomState;
use mcrs_random::Random;
use mcrs_random::positional::RandomSplitter;
use std::sync::Arc;

const BAND_COUNT: usize = 192;

/// Per-world noises and tables the surface rules read from.
pub struct SurfaceSystem {
    default_block: BlockState,
    sea_level: i32,
    random: RandomSplitter,
    surface_noise: Arc<NormalNoise>,
    secondary_noise: Arc<NormalNoise>,
    clay_bands_offset: Arc<NormalNoise>,
    clay_bands: Vec<BlockState>,
}

impl SurfaceSystem {
    pub fn new(state: &RandomState, default_block: BlockState, sea_level: i32) -> Result<Self> {
        let random = state.random();
        Ok(Self {
            default_block,
            sea_level,
            random,
            surface_noise: state.get_or_create_noise("minecraft:surface")?,
            secondary_noise: state.get_or_create_noise("minecraft:surface_secondary")?,
            clay_bands_offset: state.get_or_create_noise("minecraft:clay_bands_offset")?,
            clay_bands: generate_bands(&mut random.from_hash("minecraft:clay_bands")),
        })
    }

    pub fn default_block(&self) -> &BlockState {
        &self.default_block
    }

    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    /// Depth of the soft surface layer for a column, usually between 1 and 6.
    pub fn surface_depth(&self, x: i32, z: i32) -> i32 {
        let noise = self.surface_noise.get(x as f64, 0.0, z as f64);
        let jitter = self.random.at(x, 0, z).next_f64() * 0.25;
        (noise * 2.75 + 3.0 + jitter) as i32
    }

    pub fn surface_secondary(&self, x: i32, z: i32) -> f64 {
        self.secondary_noise.get(x as f64, 0.0, z as f64)
    }

    /// Terracotta layer for badlands, shifted per column by the band offset noise.
    pub fn band(&self, x: i32, y: i32, z: i32) -> BlockState {
        let offset = round_half_up(self.clay_bands_offset.get(x as f64, 0.0, z as f64) * 4.0);
        let len = self.clay_bands.len() as i32;
        self.clay_bands[(y + offset + len).rem_euclid(len) as usize].clone()
    }

    pub fn clay_bands(&self) -> &[BlockState] {
        &self.clay_bands
    }
}

/// Ties go toward positive infinity, so `-2.5` becomes `-2`.
fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

fn generate_bands<R: Random>(random: &mut R) -> Vec<BlockState> {
    let mut bands = vec![BlockState::new("minecraft:terracotta"); BAND_COUNT];
    let orange = BlockState::new("minecraft:orange_terracotta");
    let mut i = 0;
    while i < BAND_COUNT {
        i += random.next_i32_bound(5) as usize + 1;
        if i < BAND_COUNT {
            bands[i] = orange.clone();
        }
        i += 1;
    }
    make_bands(random, &mut bands, 1, BlockState::new("minecraft:yellow_terracotta"));
    make_bands(random, &mut bands, 2, BlockState::new("minecraft:brown_terracotta"));
    make_bands(random, &mut bands, 1, BlockState::new("minecraft:red_terracotta"));

    let white = BlockState::new("minecraft:white_terracotta");
    let light_gray = BlockState::new("minecraft:light_gray_terracotta");
    let count = random.next_i32_between_inclusive(9, 15);
    let mut placed = 0;
    let mut i = 0;
    while placed < count && i < BAND_COUNT {
        bands[i] = white.clone();
        if i > 1 && random.next_bool() {
            bands[i - 1] = light_gray.clone();
        }
        if i + 1 < BAND_COUNT && random.next_bool() {
            bands[i + 1] = light_gray.clone();
        }
        placed += 1;
        i += random.next_i32_bound(16) as usize + 4;
    }
    bands
}

fn make_bands<R: Random>(random: &mut R, bands: &mut [BlockState], min_width: i32, state: BlockState) {
    let count = random.next_i32_between_inclusive(6, 15);
    for _ in 0..count {
        let width = (min_width + random.next_i32_bound(3)) as usize;
        let start = random.next_i32_bound(bands.len() as i32) as usize;
        for band in bands.iter_mut().skip(start).take(width) {
            *band = state.clone();
        }
    }
}

#[cfg(test)]
mod test {
    use crate::block::BlockState;
    use crate::random_state::test::test_state;
    use crate::surface::system::{SurfaceSystem, round_half_up};

    fn system(seed: u64) -> SurfaceSystem {
        SurfaceSystem::new(&test_state(seed), BlockState::new("minecraft:stone"), 63).unwrap()
    }

    #[test]
    fn bands_are_terracotta() {
        let system = system(1);
        assert_eq!(system.clay_bands().len(), 192);
        assert!(system.clay_bands().iter().all(|band| band.name().ends_with("terracotta")));
        assert!(system.clay_bands().iter().any(|band| band.is("white_terracotta")));
        assert!(system.clay_bands().iter().any(|band| band.is("orange_terracotta")));
    }

    #[test]
    fn bands_depend_on_seed() {
        assert_eq!(system(5).clay_bands(), system(5).clay_bands());
        assert_ne!(system(5).clay_bands(), system(6).clay_bands());
    }

    #[test]
    fn bands_repeat_vertically() {
        let system = system(3);
        for y in -64..64 {
            assert_eq!(system.band(10, y, -4), system.band(10, y + 192, -4));
        }
    }

    #[test]
    fn band_offsets_round_ties_up() {
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.6), -3);
        assert_eq!(round_half_up(1.49), 1);
    }

    #[test]
    fn surface_depth_stays_shallow() {
        let system = system(9);
        for x in (-512..512).step_by(37) {
            for z in (-512..512).step_by(41) {
                let depth = system.surface_depth(x, z);
                assert!((-6..=12).contains(&depth), "{depth} at {x} {z}");
                assert_eq!(depth, system.surface_depth(x, z));
            }
        }
    }
}
