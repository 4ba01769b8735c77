use crate::generate::{ChunkSummary, Worldgen, generate_chunk};
use bevy_app::{App, AppExit, Plugin, Startup, Update};
use bevy_ecs::prelude::{Commands, Res, Resource, resource_exists};
use bevy_ecs::schedule::IntoScheduleConfigs;
use bevy_log::LogPlugin;
use bevy_tasks::{TaskPool, TaskPoolBuilder, block_on};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

mod generate;

const DEFAULT_BUNDLE: &str = "assets/demo_settings.json";

fn main() -> AppExit {
    let bundle = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_BUNDLE), PathBuf::from);
    App::new()
        .add_plugins(LogPlugin::default())
        .add_plugins(WorldgenDemoPlugin { bundle })
        .run()
}

struct WorldgenDemoPlugin {
    bundle: PathBuf,
}

impl Plugin for WorldgenDemoPlugin {
    fn build(&self, app: &mut App) {
        CHUNK_TASK_POOL.get_or_init(|| {
            TaskPoolBuilder::new()
                .thread_name("ChunkGen".to_string())
                .num_threads(4)
                .build()
        });
        app.insert_resource(BundlePath(self.bundle.clone()));
        app.add_systems(Startup, load_worldgen);
        app.add_systems(Update, generate_chunks.run_if(resource_exists::<OverworldGen>));
    }
}

static CHUNK_TASK_POOL: OnceLock<TaskPool> = OnceLock::new();

#[derive(Resource)]
struct BundlePath(PathBuf);

#[derive(Resource)]
struct OverworldGen(Arc<Worldgen>);

fn load_worldgen(mut commands: Commands, path: Res<BundlePath>) {
    match Worldgen::load(&path.0) {
        Ok(worldgen) => {
            info!(
                seed = worldgen.state.seed(),
                biomes = worldgen.biomes.entries().len(),
                chunks = worldgen.chunks.len(),
                "loaded {}",
                path.0.display()
            );
            let spawn = worldgen.state.sampler().find_best_spawn_position();
            info!("spawn position: {} {}", spawn.x, spawn.z);
            commands.insert_resource(OverworldGen(Arc::new(worldgen)));
        }
        Err(err) => error!("failed to load {}: {err}", path.0.display()),
    }
}

fn generate_chunks(worldgen: Res<OverworldGen>) {
    let Some(task_pool) = CHUNK_TASK_POOL.get() else {
        return;
    };
    let tasks: Vec<_> = worldgen
        .0
        .chunks
        .iter()
        .map(|&[chunk_x, chunk_z]| {
            let worldgen = worldgen.0.clone();
            task_pool.spawn(async move {
                let _span = tracing::info_span!("ChunkGen").entered();
                generate_chunk(&worldgen, chunk_x, chunk_z)
            })
        })
        .collect();

    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for task in tasks {
        let summary: ChunkSummary = block_on(task);
        info!(
            x = summary.chunk_x,
            z = summary.chunk_z,
            surfaced = summary.surfaced,
            fluid_ticks = summary.fluid_ticks,
            "generated chunk, mostly {}",
            summary.main_biome
        );
        for (name, count) in summary.blocks {
            *totals.entry(name).or_default() += count;
        }
    }
    for (name, count) in totals {
        info!("{name}: {count}");
    }
}
