use crate::climate::sampler::MultiNoiseSampler;
use crate::density_function::build::{WorldgenRegistries, normalize_name};
use crate::density_function::router::NoiseRouter;
use crate::density_function::{DensityFunction, DensityVisitor, NoiseHolder};
use crate::error::Result;
use crate::noise::blended_noise::BlendedNoise;
use crate::noise::normal_noise::NormalNoise;
use crate::noise::simplex_noise::EndIslands;
use crate::noise::{NoiseParam, Noises};
use crate::proto::NoiseGeneratorSettings;
use mcrs_random::legacy::LegacyRandom;
use mcrs_random::positional::RandomSplitter;
use mcrs_random::{Random, RandomSource};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Everything derived from one world seed: the positional random roots, the
/// instantiated noises and the bound noise router.
pub struct RandomState {
    seed: u64,
    random: RandomSplitter,
    aquifer_random: RandomSplitter,
    ore_random: RandomSplitter,
    registries: WorldgenRegistries,
    noises: Mutex<FxHashMap<String, Arc<NormalNoise>>>,
    router: NoiseRouter,
    sampler: MultiNoiseSampler,
}

impl RandomState {
    pub fn new(settings: &NoiseGeneratorSettings, registries: &WorldgenRegistries, seed: u64) -> Result<Self> {
        let router = NoiseRouter::from_proto(&settings.noise_router, registries)?;
        Self::with_router(settings, registries, &router, seed)
    }

    /// Binds an already built router to `seed`.
    pub fn with_router(
        settings: &NoiseGeneratorSettings,
        registries: &WorldgenRegistries,
        router: &NoiseRouter,
        seed: u64,
    ) -> Result<Self> {
        let legacy = settings.legacy_random_source;
        let random = RandomSource::new(seed, legacy).fork_positional();
        let mut state = RandomState {
            seed,
            random,
            aquifer_random: random.from_hash("minecraft:aquifer").fork_positional(),
            ore_random: random.from_hash("minecraft:ore").fork_positional(),
            registries: registries.clone(),
            noises: Mutex::new(FxHashMap::default()),
            router: router.clone(),
            sampler: MultiNoiseSampler {
                temperature: DensityFunction::constant(0.0),
                humidity: DensityFunction::constant(0.0),
                continentalness: DensityFunction::constant(0.0),
                erosion: DensityFunction::constant(0.0),
                depth: DensityFunction::constant(0.0),
                weirdness: DensityFunction::constant(0.0),
                spawn_target: settings.spawn_target.clone(),
            },
        };

        let mut wiring = NoiseWiring {
            state: &state,
            legacy,
        };
        let bound = router.transform(&mut wiring)?;

        let mut strip = StripMarkers;
        state.sampler.temperature = bound.temperature.transform(&mut strip)?;
        state.sampler.humidity = bound.vegetation.transform(&mut strip)?;
        state.sampler.continentalness = bound.continents.transform(&mut strip)?;
        state.sampler.erosion = bound.erosion.transform(&mut strip)?;
        state.sampler.depth = bound.depth.transform(&mut strip)?;
        state.sampler.weirdness = bound.ridges.transform(&mut strip)?;
        state.router = bound;
        debug!(
            seed,
            legacy,
            noises = state.noise_count(),
            "bound noise router"
        );
        Ok(state)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn router(&self) -> &NoiseRouter {
        &self.router
    }

    pub fn sampler(&self) -> &MultiNoiseSampler {
        &self.sampler
    }

    pub fn random(&self) -> RandomSplitter {
        self.random
    }

    pub fn aquifer_random(&self) -> RandomSplitter {
        self.aquifer_random
    }

    pub fn ore_random(&self) -> RandomSplitter {
        self.ore_random
    }

    /// A positional random root derived from a name, e.g. for vertical gradients.
    pub fn random_factory(&self, name: &str) -> RandomSplitter {
        self.random.from_hash(&normalize_name(name)).fork_positional()
    }

    /// The world's instance of a registered noise, created on first use.
    pub fn get_or_create_noise(&self, name: &str) -> Result<Arc<NormalNoise>> {
        let name = normalize_name(name);
        let params = self.registries.noise(&name)?;
        Ok(self.noise_with(&name, params))
    }

    fn noise_with(&self, name: &str, params: &NoiseParam) -> Arc<NormalNoise> {
        let mut noises = self.noises.lock().unwrap_or_else(PoisonError::into_inner);
        noises
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(NormalNoise::new(&mut self.random.from_hash(name), params)))
            .clone()
    }

    fn noise_count(&self) -> usize {
        self.noises.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn legacy_instance(&self, offset: u64) -> LegacyRandom {
        LegacyRandom::new(self.seed.wrapping_add(offset))
    }
}

struct NoiseWiring<'a> {
    state: &'a RandomState,
    legacy: bool,
}

impl DensityVisitor for NoiseWiring<'_> {
    fn visit(&mut self, function: Arc<DensityFunction>) -> Result<Arc<DensityFunction>> {
        Ok(match function.as_ref() {
            DensityFunction::BlendedNoise(noise) => {
                let params = *noise.params();
                let noise = if self.legacy {
                    BlendedNoise::new(&mut self.state.legacy_instance(0), params)?
                } else {
                    BlendedNoise::new(&mut self.state.random.from_hash("minecraft:terrain"), params)?
                };
                Arc::new(DensityFunction::BlendedNoise(Arc::new(noise)))
            }
            DensityFunction::EndIslands(_) => {
                Arc::new(DensityFunction::EndIslands(Arc::new(EndIslands::new(self.state.seed))))
            }
            _ => function,
        })
    }

    fn visit_noise(&mut self, noise: &NoiseHolder) -> Result<NoiseHolder> {
        if self.legacy {
            let legacy_biome = |offset| -> Result<NoiseHolder> {
                let params = NoiseParam::new(-7, vec![1.0, 1.0]);
                let sampler = NormalNoise::new_legacy(&mut self.state.legacy_instance(offset), &params)?;
                Ok(noise.bind(Arc::new(sampler)))
            };
            if noise.name == Noises::Temperature.name() {
                return legacy_biome(0);
            }
            if noise.name == Noises::Vegetation.name() {
                return legacy_biome(1);
            }
            if noise.name == Noises::Offset.name() {
                let params = NoiseParam::new(0, vec![0.0]);
                let sampler = NormalNoise::new(&mut self.state.random.from_hash(&noise.name), &params);
                return Ok(noise.bind(Arc::new(sampler)));
            }
        }
        Ok(noise.bind(self.state.noise_with(&noise.name, &noise.params)))
    }
}

/// Climate sampling reads single points, so caching markers only add overhead.
struct StripMarkers;

impl DensityVisitor for StripMarkers {
    fn visit(&mut self, function: Arc<DensityFunction>) -> Result<Arc<DensityFunction>> {
        Ok(match function.as_ref() {
            DensityFunction::Marker(marker) => marker.input.clone(),
            _ => function,
        })
    }
}
