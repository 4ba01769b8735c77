use crate::block;
use crate::climate::ParamPoint;
use crate::density_function::proto::DensityFunctionHolder;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct NoiseGeneratorSettings {
    pub noise: NoiseSettings,
    pub default_block: BlockState,
    pub default_fluid: BlockState,
    pub noise_router: NoiseRouter,
    pub surface_rule: SurfaceRule,
    #[serde(default)]
    pub spawn_target: Vec<ParamPoint>,
    pub sea_level: i32,
    #[serde(default)]
    pub disable_mob_generation: bool,
    pub aquifers_enabled: bool,
    #[serde(default)]
    pub ore_veins_enabled: bool,
    #[serde(default)]
    pub legacy_random_source: bool,
}

impl NoiseGeneratorSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Hash, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoiseSettings {
    pub min_y: i32,
    pub height: u32,
    pub size_horizontal: u8,
    pub size_vertical: u8,
}

impl NoiseSettings {
    /// Interpolation cell width in blocks.
    pub fn cell_width(&self) -> i32 {
        self.size_horizontal as i32 * 4
    }

    /// Interpolation cell height in blocks.
    pub fn cell_height(&self) -> i32 {
        self.size_vertical as i32 * 4
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height as i32
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct NoiseRouter {
    pub barrier: DensityFunctionHolder,
    pub fluid_level_floodedness: DensityFunctionHolder,
    pub fluid_level_spread: DensityFunctionHolder,
    pub lava: DensityFunctionHolder,
    pub temperature: DensityFunctionHolder,
    pub vegetation: DensityFunctionHolder,
    pub continents: DensityFunctionHolder,
    pub erosion: DensityFunctionHolder,
    pub depth: DensityFunctionHolder,
    pub ridges: DensityFunctionHolder,
    pub preliminary_surface_level: DensityFunctionHolder,
    pub final_density: DensityFunctionHolder,
    pub vein_toggle: DensityFunctionHolder,
    pub vein_ridged: DensityFunctionHolder,
    pub vein_gap: DensityFunctionHolder,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceRule {
    #[serde(rename = "minecraft:bandlands", alias = "bandlands")]
    Bandlands,
    #[serde(rename = "minecraft:block", alias = "block")]
    Block { result_state: BlockState },
    #[serde(rename = "minecraft:sequence", alias = "sequence")]
    Sequence { sequence: Vec<SurfaceRule> },
    #[serde(rename = "minecraft:condition", alias = "condition")]
    Condition {
        if_true: Box<ConditionSource>,
        then_run: Box<SurfaceRule>,
    },
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConditionSource {
    #[serde(rename = "minecraft:biome", alias = "biome")]
    Biome { biome_is: Vec<String> },
    #[serde(rename = "minecraft:noise_threshold", alias = "noise_threshold")]
    NoiseThreshold {
        noise: String,
        min_threshold: f64,
        max_threshold: f64,
    },
    #[serde(rename = "minecraft:vertical_gradient", alias = "vertical_gradient")]
    VerticalGradient {
        random_name: String,
        true_at_and_below: VerticalAnchor,
        false_at_and_above: VerticalAnchor,
    },
    #[serde(rename = "minecraft:y_above", alias = "y_above")]
    YAbove {
        anchor: VerticalAnchor,
        surface_depth_multiplier: i32,
        add_stone_depth: bool,
    },
    #[serde(rename = "minecraft:water", alias = "water")]
    Water {
        offset: i32,
        surface_depth_multiplier: i32,
        add_stone_depth: bool,
    },
    #[serde(rename = "minecraft:temperature", alias = "temperature")]
    Temperature,
    #[serde(rename = "minecraft:steep", alias = "steep")]
    Steep,
    #[serde(rename = "minecraft:not", alias = "not")]
    Not { invert: Box<ConditionSource> },
    #[serde(rename = "minecraft:hole", alias = "hole")]
    Hole,
    #[serde(
        rename = "minecraft:above_preliminary_surface",
        alias = "above_preliminary_surface"
    )]
    AbovePreliminarySurface,
    #[serde(rename = "minecraft:stone_depth", alias = "stone_depth")]
    StoneDepth {
        offset: i32,
        add_surface_depth: bool,
        secondary_depth_range: i32,
        surface_type: CaveSurface,
    },
}

#[derive(Hash, PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerticalAnchor {
    Absolute { absolute: i32 },
    AboveBottom { above_bottom: i32 },
    BelowTop { below_top: i32 },
}

impl VerticalAnchor {
    pub fn resolve(&self, min_y: i32, height: i32) -> i32 {
        match *self {
            VerticalAnchor::Absolute { absolute } => absolute,
            VerticalAnchor::AboveBottom { above_bottom } => min_y + above_bottom,
            VerticalAnchor::BelowTop { below_top } => min_y + height - 1 - below_top,
        }
    }
}

#[derive(Hash, PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaveSurface {
    Ceiling,
    Floor,
}

#[derive(Hash, PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct BlockState {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl From<&BlockState> for block::BlockState {
    fn from(value: &BlockState) -> Self {
        block::BlockState::with_properties(value.name.clone(), value.properties.clone().unwrap_or_default())
    }
}

/// A scalar, a `[min, max]` pair or a `{"min", "max"}` object.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "Either<I, Either<[I; 2], InternalInterval<I>>>")]
#[serde(into = "Either<I, Either<[I; 2], InternalInterval<I>>>")]
pub struct Interval<I>
where
    I: Clone + PartialEq,
{
    pub(crate) min: I,
    pub(crate) max: I,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
struct InternalInterval<I> {
    min: I,
    max: I,
}

impl<I: Clone + PartialEq> From<Either<I, Either<[I; 2], InternalInterval<I>>>> for Interval<I> {
    fn from(value: Either<I, Either<[I; 2], InternalInterval<I>>>) -> Self {
        match value {
            Either::Left(i) => Interval {
                min: i.clone(),
                max: i,
            },
            Either::Right(Either::Left([min, max])) => Interval { min, max },
            Either::Right(Either::Right(i)) => Interval {
                min: i.min,
                max: i.max,
            },
        }
    }
}

impl<I: Clone + PartialEq> From<Interval<I>> for Either<I, Either<[I; 2], InternalInterval<I>>> {
    fn from(value: Interval<I>) -> Self {
        if value.min == value.max {
            Either::Left(value.min)
        } else {
            Either::Right(Either::Left([value.min, value.max]))
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}
