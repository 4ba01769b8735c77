use crate::error::Result;
use crate::noise::NoiseParam;
use crate::noise::octave_perlin_noise::OctavePerlinNoise;
use mcrs_random::Random;

const INPUT_FACTOR: f64 = 1.0181268882175227;
const TARGET_DEVIATION: f64 = 1.0 / 6.0;

/// Two octave stacks sampled at slightly different frequencies and summed,
/// normalized so the output deviation is roughly independent of the octave count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalNoise {
    first: OctavePerlinNoise,
    second: OctavePerlinNoise,
    value_factor: f64,
    max_value: f64,
}

impl NormalNoise {
    pub fn new<R>(random: &mut R, param: &NoiseParam) -> Self
    where
        R: Random,
    {
        let first = OctavePerlinNoise::new(random, param.first_octave, param.amplitudes.clone());
        let second = OctavePerlinNoise::new(random, param.first_octave, param.amplitudes.clone());
        Self::from_stacks(first, second, &param.amplitudes)
    }

    /// Sequential octave seeding, used by old-style nether biome climate noise.
    pub fn new_legacy<R>(random: &mut R, param: &NoiseParam) -> Result<Self>
    where
        R: Random,
    {
        let first =
            OctavePerlinNoise::new_legacy(random, param.first_octave, param.amplitudes.clone())?;
        let second =
            OctavePerlinNoise::new_legacy(random, param.first_octave, param.amplitudes.clone())?;
        Ok(Self::from_stacks(first, second, &param.amplitudes))
    }

    fn from_stacks(first: OctavePerlinNoise, second: OctavePerlinNoise, amplitudes: &[f64]) -> Self {
        let mut min = i32::MAX;
        let mut max = i32::MIN;
        for (i, value) in amplitudes.iter().enumerate() {
            if *value != 0.0 {
                min = min.min(i as i32);
                max = max.max(i as i32);
            }
        }
        // With no active octave this wraps to 1, which only matters for a zero max value.
        let span = max.wrapping_sub(min);
        let expected_deviation = 0.1 * (1.0 + 1.0 / (span as f64 + 1.0));
        let value_factor = TARGET_DEVIATION / expected_deviation;
        let max_value = (first.max_value() + second.max_value()) * value_factor;
        Self {
            first,
            second,
            value_factor,
            max_value,
        }
    }

    #[inline]
    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    #[inline]
    pub fn get(&self, x: f64, y: f64, z: f64) -> f64 {
        let x2 = x * INPUT_FACTOR;
        let y2 = y * INPUT_FACTOR;
        let z2 = z * INPUT_FACTOR;
        (self.first.get(x, y, z) + self.second.get(x2, y2, z2)) * self.value_factor
    }
}
