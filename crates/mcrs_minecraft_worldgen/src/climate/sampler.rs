use crate::climate::{ParamPoint, QuantizedCoord, TargetPoint};
use crate::density_function::{DensityFunction, SampleContext, Uncached};
use crate::math::{quart_from_block, quart_to_block};
use bevy_math::IVec3;
use std::f64::consts::TAU;
use std::sync::Arc;
use tracing::debug;

/// The six climate density functions plus the spawn preference list.
#[derive(Clone, Debug)]
pub struct MultiNoiseSampler {
    pub temperature: Arc<DensityFunction>,
    pub humidity: Arc<DensityFunction>,
    pub continentalness: Arc<DensityFunction>,
    pub erosion: Arc<DensityFunction>,
    pub depth: Arc<DensityFunction>,
    pub weirdness: Arc<DensityFunction>,
    pub spawn_target: Vec<ParamPoint>,
}

impl MultiNoiseSampler {
    /// Samples at quart coordinates.
    pub fn sample(&self, x: i32, y: i32, z: i32) -> TargetPoint {
        self.sample_in(x, y, z, &mut Uncached)
    }

    pub fn sample_in<C>(&self, x: i32, y: i32, z: i32, ctx: &mut C) -> TargetPoint
    where
        C: SampleContext + ?Sized,
    {
        let pos = IVec3::new(quart_to_block(x), quart_to_block(y), quart_to_block(z));
        let mut quantize =
            |function: &Arc<DensityFunction>| QuantizedCoord::from(function.compute(pos, ctx) as f32);
        TargetPoint {
            temperature: quantize(&self.temperature),
            humidity: quantize(&self.humidity),
            continentalness: quantize(&self.continentalness),
            erosion: quantize(&self.erosion),
            depth: quantize(&self.depth),
            weirdness: quantize(&self.weirdness),
        }
    }

    /// Local search for a block column whose climate suits `spawn_target`, biased
    /// towards the origin. Returns the origin when there are no targets.
    pub fn find_best_spawn_position(&self) -> IVec3 {
        if self.spawn_target.is_empty() {
            return IVec3::ZERO;
        }
        let mut best = self.spawn_candidate(0, 0);
        self.radial_search(&mut best, 2048.0, 512.0);
        self.radial_search(&mut best, 512.0, 32.0);
        debug!(x = best.0.x, z = best.0.z, fitness = best.1, "found spawn position");
        best.0
    }

    fn radial_search(&self, best: &mut (IVec3, i64), max_radius: f32, step: f32) {
        let center = best.0;
        let mut angle = 0.0f32;
        let mut radius = step;
        while radius <= max_radius {
            let x = center.x + ((angle as f64).sin() * radius as f64) as i32;
            let z = center.z + ((angle as f64).cos() * radius as f64) as i32;
            let candidate = self.spawn_candidate(x, z);
            if candidate.1 < best.1 {
                *best = candidate;
            }
            angle += step / radius;
            if angle as f64 > TAU {
                angle = 0.0;
                radius += step;
            }
        }
    }

    pub(crate) fn spawn_candidate(&self, x: i32, z: i32) -> (IVec3, i64) {
        let distance = (x as i64 * x as i64 + z as i64 * z as i64) as f64 / (2500.0 * 2500.0);
        let origin_bias = (10000.0f32 * 10000.0f32) as f64 * distance.powi(2);
        let mut target = self.sample(quart_from_block(x), 0, quart_from_block(z));
        target.depth = QuantizedCoord(0);
        let fitness = self
            .spawn_target
            .iter()
            .map(|point| point.fitness(&target))
            .min()
            .unwrap_or(i64::MAX);
        (IVec3::new(x, 0, z), (origin_bias as i64).wrapping_add(fitness))
    }
}

#[cfg(test)]
mod test {
    use crate::climate::sampler::MultiNoiseSampler;
    use crate::climate::{Param, ParamPoint};
    use crate::density_function::DensityFunction;
    use crate::density_function::cache::ChunkCache;
    use crate::density_function::test::bound_noise;
    use bevy_math::IVec3;

    fn constant_sampler(spawn_target: Vec<ParamPoint>) -> MultiNoiseSampler {
        MultiNoiseSampler {
            temperature: DensityFunction::constant(0.25),
            humidity: DensityFunction::constant(-0.5),
            continentalness: DensityFunction::constant(0.3),
            erosion: DensityFunction::constant(0.0),
            depth: DensityFunction::y_clamped_gradient(-64, 320, 1.5, -1.5),
            weirdness: DensityFunction::constant(1.0),
            spawn_target,
        }
    }

    fn noisy_sampler(spawn_target: Vec<ParamPoint>) -> MultiNoiseSampler {
        let noise = |seed, name| DensityFunction::noise(bound_noise(seed, name, -9, vec![1.0, 1.0]), 0.25, 0.0);
        MultiNoiseSampler {
            temperature: noise(1, "temperature"),
            humidity: noise(2, "vegetation"),
            continentalness: noise(3, "continentalness"),
            erosion: noise(4, "erosion"),
            depth: DensityFunction::y_clamped_gradient(-64, 320, 1.5, -1.5),
            weirdness: noise(5, "ridge"),
            spawn_target,
        }
    }

    #[test]
    fn samples_at_block_coordinates() {
        let sampler = constant_sampler(Vec::new());
        let point = sampler.sample(3, 16, -2);
        assert_eq!(point.temperature.0, 2500);
        assert_eq!(point.humidity.0, -5000);
        assert_eq!(point.continentalness.0, 3000);
        assert_eq!(point.weirdness.0, 10000);
        // quart y 16 is block y 64
        let depth = sampler.depth.sample(IVec3::new(12, 64, -8)) as f32;
        assert_eq!(point.depth.0, (depth * 10000.0) as i64);
    }

    #[test]
    fn cached_sampling_matches() {
        let sampler = noisy_sampler(Vec::new());
        let mut cache = ChunkCache::new(4, 8);
        for x in -8..8 {
            for z in -8..8 {
                assert_eq!(sampler.sample(x, 10, z), sampler.sample_in(x, 10, z, &mut cache));
            }
        }
    }

    #[test]
    fn no_targets_spawn_at_origin() {
        assert_eq!(noisy_sampler(Vec::new()).find_best_spawn_position(), IVec3::ZERO);
    }

    #[test]
    fn uniform_climate_spawns_at_origin() {
        let full = Param::span(-1.0f32, 1.0).unwrap();
        let target = ParamPoint::new(full, full, full, full, full, full, 0.0f32);
        assert_eq!(constant_sampler(vec![target]).find_best_spawn_position(), IVec3::ZERO);
    }

    #[test]
    fn spawn_search_improves_fitness() {
        let range = Param::span(0.3f32, 0.6).unwrap();
        let full = Param::span(-1.0f32, 1.0).unwrap();
        let target = ParamPoint::new(range, full, range, full, full, full, 0.0f32);
        let sampler = noisy_sampler(vec![target]);
        let found = sampler.find_best_spawn_position();
        assert_eq!(found, sampler.find_best_spawn_position());
        assert_eq!(found.y, 0);
        assert!(sampler.spawn_candidate(found.x, found.z).1 <= sampler.spawn_candidate(0, 0).1);
    }

    #[test]
    fn distance_bias_grows_with_radius() {
        let full = Param::span(-1.0f32, 1.0).unwrap();
        let target = ParamPoint::new(full, full, full, full, full, full, 0.0f32);
        let sampler = constant_sampler(vec![target]);
        assert_eq!(sampler.spawn_candidate(0, 0).1, 0);
        assert_eq!(sampler.spawn_candidate(2500, 0).1, 100_000_000);
        assert!(sampler.spawn_candidate(512, 512).1 < sampler.spawn_candidate(1024, 0).1);
    }
}
