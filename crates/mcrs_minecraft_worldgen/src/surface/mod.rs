//! Surface material rules.
//!
//! A [`SurfaceRules`] tree is compiled once per world from the data format. Running it for a
//! chunk goes through a [`MaterialRuleContext`], which walks columns top to bottom and memoizes
//! condition results per column or per block.

pub mod context;
pub mod system;

use crate::aquifer::WAY_BELOW_MIN_Y;
use crate::block::BlockState;
use crate::density_function::build::normalize_name;
use crate::error::Result;
use crate::noise::normal_noise::NormalNoise;
use crate::proto::{CaveSurface, ConditionSource, SurfaceRule};
use crate::random_state::RandomState;
use bevy_math::IVec3;
use mcrs_random::positional::RandomSplitter;
use std::sync::Arc;
use tracing::debug;

pub use context::{BlockContext, Cached, ColumnContext, MaterialRuleContext};
pub use system::SurfaceSystem;

/// The chunk being surfaced, as seen by the rules and the column driver.
pub trait SurfaceChunk {
    fn min_y(&self) -> i32;

    /// Block at a world position; positions outside the chunk's height range read as air.
    fn block(&self, pos: IVec3) -> BlockState;

    fn set_block(&mut self, pos: IVec3, state: BlockState);

    /// One above the highest non-air block of a column, in chunk-local coordinates.
    fn surface_height(&self, local_x: i32, local_z: i32) -> i32;

    /// Namespaced biome id at a world position.
    fn biome(&self, pos: IVec3) -> Arc<str>;

    fn cold_enough_to_snow(&self, biome: &str, pos: IVec3, sea_level: i32) -> bool;
}

#[derive(Debug)]
pub(crate) enum Rule {
    Block(BlockState),
    Sequence(Vec<Rule>),
    Condition { condition: Condition, then_run: Box<Rule> },
    Bandlands,
}

pub(crate) enum Condition {
    Biome {
        slot: usize,
        biomes: Vec<String>,
    },
    NoiseThreshold {
        slot: usize,
        noise: Arc<NormalNoise>,
        min: f64,
        max: f64,
    },
    VerticalGradient {
        slot: usize,
        random: RandomSplitter,
        true_at_and_below: i32,
        false_at_and_above: i32,
    },
    YAbove {
        anchor: i32,
        surface_depth_multiplier: i32,
        add_stone_depth: bool,
    },
    Water {
        offset: i32,
        surface_depth_multiplier: i32,
        add_stone_depth: bool,
    },
    Temperature,
    Steep,
    Not(Box<Condition>),
    Hole,
    AbovePreliminarySurface,
    StoneDepth {
        offset: i32,
        add_surface_depth: bool,
        secondary_depth_range: i32,
        ceiling: bool,
    },
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::Biome { biomes, .. } => write!(f, "Biome({biomes:?})"),
            Condition::NoiseThreshold { min, max, .. } => write!(f, "NoiseThreshold({min}..={max})"),
            Condition::VerticalGradient {
                true_at_and_below,
                false_at_and_above,
                ..
            } => write!(f, "VerticalGradient({true_at_and_below}..{false_at_and_above})"),
            Condition::YAbove { anchor, .. } => write!(f, "YAbove({anchor})"),
            Condition::Water { offset, .. } => write!(f, "Water({offset})"),
            Condition::Temperature => f.write_str("Temperature"),
            Condition::Steep => f.write_str("Steep"),
            Condition::Not(inner) => write!(f, "Not({inner:?})"),
            Condition::Hole => f.write_str("Hole"),
            Condition::AbovePreliminarySurface => f.write_str("AbovePreliminarySurface"),
            Condition::StoneDepth { offset, .. } => write!(f, "StoneDepth({offset})"),
        }
    }
}

/// An immutable rule tree with its noises, randoms and anchors resolved for one world.
#[derive(Debug)]
pub struct SurfaceRules {
    root: Rule,
    slots: usize,
}

impl SurfaceRules {
    pub fn compile(rule: &SurfaceRule, state: &RandomState, min_y: i32, height: i32) -> Result<Self> {
        let mut compiler = Compiler {
            state,
            min_y,
            height,
            slots: 0,
        };
        let root = compiler.rule(rule)?;
        debug!(slots = compiler.slots, "compiled surface rules");
        Ok(SurfaceRules {
            root,
            slots: compiler.slots,
        })
    }

    /// Number of memoized condition slots a context needs for these rules.
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub(crate) fn root(&self) -> &Rule {
        &self.root
    }
}

struct Compiler<'a> {
    state: &'a RandomState,
    min_y: i32,
    height: i32,
    slots: usize,
}

impl Compiler<'_> {
    fn slot(&mut self) -> usize {
        self.slots += 1;
        self.slots - 1
    }

    fn rule(&mut self, rule: &SurfaceRule) -> Result<Rule> {
        Ok(match rule {
            SurfaceRule::Bandlands => Rule::Bandlands,
            SurfaceRule::Block { result_state } => Rule::Block(result_state.into()),
            SurfaceRule::Sequence { sequence } => {
                Rule::Sequence(sequence.iter().map(|rule| self.rule(rule)).collect::<Result<_>>()?)
            }
            SurfaceRule::Condition { if_true, then_run } => Rule::Condition {
                condition: self.condition(if_true)?,
                then_run: Box::new(self.rule(then_run)?),
            },
        })
    }

    fn condition(&mut self, condition: &ConditionSource) -> Result<Condition> {
        Ok(match condition {
            ConditionSource::Biome { biome_is } => Condition::Biome {
                slot: self.slot(),
                biomes: biome_is.iter().map(|name| normalize_name(name)).collect(),
            },
            ConditionSource::NoiseThreshold {
                noise,
                min_threshold,
                max_threshold,
            } => Condition::NoiseThreshold {
                slot: self.slot(),
                noise: self.state.get_or_create_noise(noise)?,
                min: *min_threshold,
                max: *max_threshold,
            },
            ConditionSource::VerticalGradient {
                random_name,
                true_at_and_below,
                false_at_and_above,
            } => Condition::VerticalGradient {
                slot: self.slot(),
                random: self.state.random_factory(random_name),
                true_at_and_below: true_at_and_below.resolve(self.min_y, self.height),
                false_at_and_above: false_at_and_above.resolve(self.min_y, self.height),
            },
            ConditionSource::YAbove {
                anchor,
                surface_depth_multiplier,
                add_stone_depth,
            } => Condition::YAbove {
                anchor: anchor.resolve(self.min_y, self.height),
                surface_depth_multiplier: *surface_depth_multiplier,
                add_stone_depth: *add_stone_depth,
            },
            ConditionSource::Water {
                offset,
                surface_depth_multiplier,
                add_stone_depth,
            } => Condition::Water {
                offset: *offset,
                surface_depth_multiplier: *surface_depth_multiplier,
                add_stone_depth: *add_stone_depth,
            },
            ConditionSource::Temperature => Condition::Temperature,
            ConditionSource::Steep => Condition::Steep,
            ConditionSource::Not { invert } => Condition::Not(Box::new(self.condition(invert)?)),
            ConditionSource::Hole => Condition::Hole,
            ConditionSource::AbovePreliminarySurface => Condition::AbovePreliminarySurface,
            ConditionSource::StoneDepth {
                offset,
                add_surface_depth,
                secondary_depth_range,
                surface_type,
            } => Condition::StoneDepth {
                offset: *offset,
                add_surface_depth: *add_surface_depth,
                secondary_depth_range: *secondary_depth_range,
                ceiling: *surface_type == CaveSurface::Ceiling,
            },
        })
    }
}

fn is_stone(state: &BlockState) -> bool {
    !state.is_air() && !state.has_fluid()
}

/// Replaces default blocks near the surface of every column in a chunk.
///
/// Returns the number of blocks replaced.
pub fn build_surface<C>(context: &mut MaterialRuleContext<'_>, chunk: &mut C, chunk_x: i32, chunk_z: i32) -> usize
where
    C: SurfaceChunk + ?Sized,
{
    let min_y = chunk.min_y();
    let default_block = context.system().default_block().clone();
    let mut replaced = Vec::new();
    let mut total = 0;
    for local_x in 0..16 {
        for local_z in 0..16 {
            let x = chunk_x * 16 + local_x;
            let z = chunk_z * 16 + local_z;
            let top = chunk.surface_height(local_x, local_z) + 1;
            let mut column = context.init_horizontal(&*chunk, x, z);
            let mut stone_depth_above = 0;
            let mut water_height = i32::MIN;
            let mut stone_floor = i32::MAX;
            for y in (min_y..=top).rev() {
                let state = chunk.block(IVec3::new(x, y, z));
                if state.is_air() {
                    stone_depth_above = 0;
                    water_height = i32::MIN;
                    continue;
                }
                if state.has_fluid() {
                    if water_height == i32::MIN {
                        water_height = y + 1;
                    }
                    continue;
                }
                if stone_floor >= y {
                    stone_floor = WAY_BELOW_MIN_Y;
                    for below in (min_y - 1..y).rev() {
                        if !is_stone(&chunk.block(IVec3::new(x, below, z))) {
                            stone_floor = below + 1;
                            break;
                        }
                    }
                }
                stone_depth_above += 1;
                let stone_depth_below = y - stone_floor + 1;
                let mut block = column.init_vertical(stone_depth_above, stone_depth_below, water_height, y);
                if state == default_block
                    && let Some(result) = block.apply()
                {
                    replaced.push((y, result));
                }
            }
            total += replaced.len();
            for (y, state) in replaced.drain(..) {
                chunk.set_block(IVec3::new(x, y, z), state);
            }
        }
    }
    total
}
