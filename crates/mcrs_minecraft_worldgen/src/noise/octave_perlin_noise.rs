use crate::error::{Result, WorldgenError};
use crate::noise::improved_noise::ImprovedNoise;
use mcrs_random::Random;

const LEGACY_SKIPPED_CALLS: usize = 262;
const WRAP_PERIOD: f64 = 3.3554432E7;

/// A stack of [`ImprovedNoise`] octaves; octave `i` runs at `2^(first_octave + i)` frequency.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OctavePerlinNoise {
    first_octave: i32,
    lacunarity: f64,
    persistence: f64,
    max_value: f64,
    amplitudes: Vec<f64>,
    octave_samplers: Vec<Option<ImprovedNoise>>,
}

impl OctavePerlinNoise {
    /// Seeds every octave from its own `octave_<n>` hash of a positional fork.
    pub fn new<T>(random: &mut T, first_octave: i32, amplitudes: Vec<f64>) -> Self
    where
        T: Random,
    {
        let splitter = random.fork_positional();
        let octave_samplers = amplitudes
            .iter()
            .enumerate()
            .map(|(i, amplitude)| {
                (*amplitude != 0.0).then(|| {
                    let octave = first_octave + i as i32;
                    ImprovedNoise::from_random(&mut splitter.from_hash(&format!("octave_{octave}")))
                })
            })
            .collect();
        Self::from_parts(first_octave, amplitudes, octave_samplers)
    }

    /// Seeds octaves sequentially from the highest octave down, skipping the
    /// random calls a missing octave would have made.
    pub fn new_legacy<T>(random: &mut T, first_octave: i32, amplitudes: Vec<f64>) -> Result<Self>
    where
        T: Random,
    {
        let len = amplitudes.len() as i32;
        let zero_octave = -first_octave;
        if zero_octave < len - 1 {
            return Err(WorldgenError::InvalidNoise(format!(
                "legacy octaves must not go above 0 (first octave {first_octave}, {len} amplitudes)"
            )));
        }
        let mut octave_samplers = vec![None; amplitudes.len()];

        let top = ImprovedNoise::from_random(random);
        if zero_octave >= 0 && zero_octave < len && amplitudes[zero_octave as usize] != 0.0 {
            octave_samplers[zero_octave as usize] = Some(top);
        }
        for i in (0..zero_octave).rev() {
            if i < len && amplitudes[i as usize] != 0.0 {
                octave_samplers[i as usize] = Some(ImprovedNoise::from_random(random));
            } else {
                random.consume(LEGACY_SKIPPED_CALLS);
            }
        }
        Ok(Self::from_parts(first_octave, amplitudes, octave_samplers))
    }

    fn from_parts(
        first_octave: i32,
        amplitudes: Vec<f64>,
        octave_samplers: Vec<Option<ImprovedNoise>>,
    ) -> Self {
        let len = amplitudes.len() as i32;
        let mut noise = Self {
            first_octave,
            lacunarity: 2f64.powi(first_octave),
            persistence: 2f64.powi(len - 1) / (2f64.powi(len) - 1.0),
            max_value: 0.0,
            amplitudes,
            octave_samplers,
        };
        noise.max_value = noise.edge_value(2.0);
        noise
    }

    pub fn first_octave(&self) -> i32 {
        self.first_octave
    }

    /// Octave counted from the highest frequency down.
    pub fn get_octave(&self, octave: usize) -> Option<&ImprovedNoise> {
        let len = self.octave_samplers.len();
        if octave >= len {
            return None;
        }
        self.octave_samplers[len - 1 - octave].as_ref()
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn edge_value(&self, scale: f64) -> f64 {
        let mut value = 0.0;
        let mut factor = self.persistence;
        for (sampler, amplitude) in self.octave_samplers.iter().zip(&self.amplitudes) {
            if sampler.is_some() {
                value += amplitude * scale * factor;
            }
            factor *= 0.5;
        }
        value
    }

    /// Folds large coordinates back near the origin so the lattice keeps its precision.
    #[inline(always)]
    pub fn wrap(value: f64) -> f64 {
        value - (value / WRAP_PERIOD + 0.5).floor() * WRAP_PERIOD
    }

    #[inline]
    pub fn get(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut lacunarity = self.lacunarity;
        let mut persistence = self.persistence;
        let mut acc = 0.0;
        for (sampler, amplitude) in self.octave_samplers.iter().zip(&self.amplitudes) {
            if let Some(sampler) = sampler {
                let sample = sampler.sample(
                    Self::wrap(x * lacunarity),
                    Self::wrap(y * lacunarity),
                    Self::wrap(z * lacunarity),
                    0.0,
                    0.0,
                );
                acc += amplitude * sample * persistence;
            }
            lacunarity *= 2.0;
            persistence *= 0.5;
        }
        acc
    }
}
