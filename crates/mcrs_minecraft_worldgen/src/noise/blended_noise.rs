use crate::error::Result;
use crate::math::clamped_lerp;
use crate::noise::octave_perlin_noise::OctavePerlinNoise;
use mcrs_random::Random;
use serde::{Deserialize, Serialize};

const MAIN_OCTAVES: usize = 8;
const LIMIT_OCTAVES: usize = 16;

/// Scale parameters of the old 3D terrain noise, as they appear in settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendedNoiseParams {
    pub xz_scale: f64,
    pub y_scale: f64,
    pub xz_factor: f64,
    pub y_factor: f64,
    pub smear_scale_multiplier: f64,
}

impl Default for BlendedNoiseParams {
    fn default() -> Self {
        Self {
            xz_scale: 0.25,
            y_scale: 0.125,
            xz_factor: 80.0,
            y_factor: 160.0,
            smear_scale_multiplier: 8.0,
        }
    }
}

/// Old terrain noise: a main stack picks a blend between two limit stacks.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendedNoise {
    params: BlendedNoiseParams,
    xz_multiplier: f64,
    y_multiplier: f64,
    smear: f64,
    factored_smear: f64,
    max_value: f64,
    min_limit_noise: OctavePerlinNoise,
    max_limit_noise: OctavePerlinNoise,
    main_noise: OctavePerlinNoise,
}

impl BlendedNoise {
    pub fn new<R>(random: &mut R, params: BlendedNoiseParams) -> Result<Self>
    where
        R: Random,
    {
        let min_limit_noise = OctavePerlinNoise::new_legacy(random, -15, vec![1.0; LIMIT_OCTAVES])?;
        let max_limit_noise = OctavePerlinNoise::new_legacy(random, -15, vec![1.0; LIMIT_OCTAVES])?;
        let main_noise = OctavePerlinNoise::new_legacy(random, -7, vec![1.0; MAIN_OCTAVES])?;

        let xz_multiplier = 684.412 * params.xz_scale;
        let y_multiplier = 684.412 * params.y_scale;
        let smear = params.smear_scale_multiplier * y_multiplier;
        let max_value = min_limit_noise.edge_value(y_multiplier + 2.0);
        Ok(Self {
            params,
            xz_multiplier,
            y_multiplier,
            smear,
            factored_smear: smear / params.y_factor,
            max_value,
            min_limit_noise,
            max_limit_noise,
            main_noise,
        })
    }

    pub fn params(&self) -> &BlendedNoiseParams {
        &self.params
    }

    pub fn compute(&self, x: i32, y: i32, z: i32) -> f64 {
        let scaled_x = x as f64 * self.xz_multiplier;
        let scaled_y = y as f64 * self.y_multiplier;
        let scaled_z = z as f64 * self.xz_multiplier;

        let factored_x = scaled_x / self.params.xz_factor;
        let factored_y = scaled_y / self.params.y_factor;
        let factored_z = scaled_z / self.params.xz_factor;

        let mut value = 0.0;
        let mut factor = 1.0;
        for i in 0..MAIN_OCTAVES {
            if let Some(noise) = self.main_noise.get_octave(i) {
                value += noise.sample(
                    OctavePerlinNoise::wrap(factored_x * factor),
                    OctavePerlinNoise::wrap(factored_y * factor),
                    OctavePerlinNoise::wrap(factored_z * factor),
                    self.factored_smear * factor,
                    factored_y * factor,
                ) / factor;
            }
            factor /= 2.0;
        }

        let delta = (value / 10.0 + 1.0) / 2.0;
        let needs_max = delta > 0.0;
        let needs_min = delta < 1.0;
        let mut min = 0.0;
        let mut max = 0.0;
        factor = 1.0;
        for i in 0..LIMIT_OCTAVES {
            let xx = OctavePerlinNoise::wrap(scaled_x * factor);
            let yy = OctavePerlinNoise::wrap(scaled_y * factor);
            let zz = OctavePerlinNoise::wrap(scaled_z * factor);
            let smear = self.smear * factor;
            if needs_min && let Some(noise) = self.min_limit_noise.get_octave(i) {
                min += noise.sample(xx, yy, zz, smear, scaled_y * factor) / factor;
            }
            if needs_max && let Some(noise) = self.max_limit_noise.get_octave(i) {
                max += noise.sample(xx, yy, zz, smear, scaled_y * factor) / factor;
            }
            factor /= 2.0;
        }

        clamped_lerp(min / 512.0, max / 512.0, delta) / 128.0
    }

    #[inline]
    pub fn min_value(&self) -> f64 {
        -self.max_value
    }

    #[inline]
    pub fn max_value(&self) -> f64 {
        self.max_value
    }
}
