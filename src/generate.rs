use bevy_math::IVec3;
use mcrs_minecraft_worldgen::aquifer::{AquiferSampler, SeaLevelFluidPicker};
use mcrs_minecraft_worldgen::block::BlockState;
use mcrs_minecraft_worldgen::climate::ParamPoint;
use mcrs_minecraft_worldgen::climate::search_tree::{SearchHint, SearchTree};
use mcrs_minecraft_worldgen::density_function::build::WorldgenRegistries;
use mcrs_minecraft_worldgen::density_function::cache::{ChunkCache, PreliminarySurface};
use mcrs_minecraft_worldgen::density_function::proto::DensityFunctionHolder;
use mcrs_minecraft_worldgen::error::Result;
use mcrs_minecraft_worldgen::math::quart_from_block;
use mcrs_minecraft_worldgen::noise::NoiseParam;
use mcrs_minecraft_worldgen::proto::NoiseGeneratorSettings;
use mcrs_minecraft_worldgen::random_state::RandomState;
use mcrs_minecraft_worldgen::surface::{
    MaterialRuleContext, SurfaceChunk, SurfaceRules, SurfaceSystem, build_surface,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Everything one dimension needs, loaded from a single JSON bundle.
#[derive(Deserialize)]
struct SettingsBundle {
    seed: u64,
    settings: NoiseGeneratorSettings,
    #[serde(default)]
    density_functions: BTreeMap<String, DensityFunctionHolder>,
    #[serde(default)]
    noises: BTreeMap<String, NoiseParam>,
    biomes: Vec<BiomeEntry>,
    #[serde(default)]
    cold_biomes: Vec<String>,
    chunks: Vec<[i32; 2]>,
}

#[derive(Deserialize)]
struct BiomeEntry {
    biome: String,
    parameters: ParamPoint,
}

pub struct Worldgen {
    pub settings: NoiseGeneratorSettings,
    pub state: RandomState,
    pub biomes: SearchTree<Arc<str>>,
    pub rules: SurfaceRules,
    pub system: SurfaceSystem,
    pub cold_biomes: Vec<String>,
    pub chunks: Vec<[i32; 2]>,
}

impl Worldgen {
    pub fn load(path: &Path) -> Result<Self> {
        let bundle: SettingsBundle = serde_json::from_slice(&std::fs::read(path)?)?;
        let mut registries = WorldgenRegistries::default();
        for (name, function) in bundle.density_functions {
            registries.register_density_function(&name, function);
        }
        for (name, params) in bundle.noises {
            registries.register_noise(&name, params);
        }
        let settings = bundle.settings;
        let state = RandomState::new(&settings, &registries, bundle.seed)?;
        let biomes = SearchTree::new(
            bundle
                .biomes
                .into_iter()
                .map(|entry| (entry.parameters, Arc::<str>::from(entry.biome))),
        )?;
        let noise = settings.noise;
        let rules = SurfaceRules::compile(&settings.surface_rule, &state, noise.min_y, noise.height as i32)?;
        let system = SurfaceSystem::new(&state, (&settings.default_block).into(), settings.sea_level)?;
        Ok(Worldgen {
            settings,
            state,
            biomes,
            rules,
            system,
            cold_biomes: bundle.cold_biomes,
            chunks: bundle.chunks,
        })
    }
}

pub struct ChunkSummary {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub blocks: BTreeMap<String, usize>,
    pub fluid_ticks: usize,
    pub surfaced: usize,
    pub main_biome: Arc<str>,
}

/// Block and biome storage for one full-height chunk.
struct DemoChunk<'w> {
    chunk_x: i32,
    chunk_z: i32,
    min_y: i32,
    height: i32,
    blocks: Vec<BlockState>,
    biomes: Vec<Arc<str>>,
    heights: [i32; 256],
    cold_biomes: &'w [String],
}

impl DemoChunk<'_> {
    fn index(&self, pos: IVec3) -> Option<usize> {
        let x = pos.x - self.chunk_x * 16;
        let z = pos.z - self.chunk_z * 16;
        let y = pos.y - self.min_y;
        if !(0..16).contains(&x) || !(0..16).contains(&z) || !(0..self.height).contains(&y) {
            return None;
        }
        Some(((y * 16 + z) * 16 + x) as usize)
    }

    fn biome_index(&self, pos: IVec3) -> usize {
        let x = quart_from_block(pos.x - self.chunk_x * 16).clamp(0, 3);
        let z = quart_from_block(pos.z - self.chunk_z * 16).clamp(0, 3);
        let y = quart_from_block(pos.y - self.min_y).clamp(0, self.height / 4 - 1);
        ((y * 4 + z) * 4 + x) as usize
    }

    fn update_heights(&mut self) {
        for local_x in 0..16 {
            for local_z in 0..16 {
                let x = self.chunk_x * 16 + local_x;
                let z = self.chunk_z * 16 + local_z;
                let top = (self.min_y..self.min_y + self.height)
                    .rev()
                    .find(|&y| !self.block(IVec3::new(x, y, z)).is_air())
                    .map_or(self.min_y, |y| y + 1);
                self.heights[(local_z * 16 + local_x) as usize] = top;
            }
        }
    }
}

impl SurfaceChunk for DemoChunk<'_> {
    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn block(&self, pos: IVec3) -> BlockState {
        match self.index(pos) {
            Some(index) => self.blocks[index].clone(),
            None => BlockState::air(),
        }
    }

    fn set_block(&mut self, pos: IVec3, state: BlockState) {
        if let Some(index) = self.index(pos) {
            self.blocks[index] = state;
        }
    }

    fn surface_height(&self, local_x: i32, local_z: i32) -> i32 {
        self.heights[(local_z * 16 + local_x) as usize]
    }

    fn biome(&self, pos: IVec3) -> Arc<str> {
        self.biomes[self.biome_index(pos)].clone()
    }

    fn cold_enough_to_snow(&self, biome: &str, _pos: IVec3, _sea_level: i32) -> bool {
        self.cold_biomes.iter().any(|cold| cold == biome)
    }
}

/// Runs the noise, aquifer, biome and surface stages for one chunk.
pub fn generate_chunk(worldgen: &Worldgen, chunk_x: i32, chunk_z: i32) -> ChunkSummary {
    let settings = &worldgen.settings;
    let noise = settings.noise;
    let router = worldgen.state.router();
    let (min_y, height) = (noise.min_y, noise.height as i32);
    let default_block: BlockState = (&settings.default_block).into();
    let picker = SeaLevelFluidPicker::new(settings.sea_level, (&settings.default_fluid).into());
    let mut aquifer = if settings.aquifers_enabled {
        AquiferSampler::new(
            chunk_x,
            chunk_z,
            min_y,
            height,
            worldgen.state.aquifer_random(),
            router,
            picker,
        )
    } else {
        AquiferSampler::disabled(picker)
    };

    let mut chunk = DemoChunk {
        chunk_x,
        chunk_z,
        min_y,
        height,
        blocks: vec![BlockState::air(); (16 * 16 * height) as usize],
        biomes: Vec::with_capacity((16 * height / 4) as usize),
        heights: [min_y; 256],
        cold_biomes: &worldgen.cold_biomes,
    };

    let mut cache = ChunkCache::new(noise.cell_width(), noise.cell_height());
    let mut fluid_ticks = 0;
    for local_x in 0..16 {
        for local_z in 0..16 {
            for y in (min_y..min_y + height).rev() {
                let pos = IVec3::new(chunk_x * 16 + local_x, y, chunk_z * 16 + local_z);
                let density = cache.sample(&router.final_density, pos);
                let state = match aquifer.apply(pos, density) {
                    Some(state) => state,
                    None => default_block.clone(),
                };
                if aquifer.needs_fluid_tick() {
                    fluid_ticks += 1;
                }
                chunk.set_block(pos, state);
            }
        }
    }

    let mut hint = SearchHint::new();
    let sampler = worldgen.state.sampler();
    let mut counts: BTreeMap<Arc<str>, usize> = BTreeMap::new();
    for quart_y in 0..height / 4 {
        for quart_z in 0..4 {
            for quart_x in 0..4 {
                let target = sampler.sample(
                    chunk_x * 4 + quart_x,
                    quart_from_block(min_y) + quart_y,
                    chunk_z * 4 + quart_z,
                );
                let biome = worldgen.biomes.lookup(&target, &mut hint).clone();
                *counts.entry(biome.clone()).or_default() += 1;
                chunk.biomes.push(biome);
            }
        }
    }

    chunk.update_heights();
    let surface = PreliminarySurface::new(router.preliminary_surface_level.clone());
    let mut context = MaterialRuleContext::new(&worldgen.system, &worldgen.rules, surface);
    let surfaced = build_surface(&mut context, &mut chunk, chunk_x, chunk_z);

    let mut blocks = BTreeMap::new();
    for state in &chunk.blocks {
        *blocks.entry(state.name().to_owned()).or_default() += 1;
    }
    let main_biome = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map_or_else(|| Arc::from("minecraft:plains"), |(biome, _)| biome);
    ChunkSummary {
        chunk_x,
        chunk_z,
        blocks,
        fluid_ticks,
        surfaced,
        main_biome,
    }
}
