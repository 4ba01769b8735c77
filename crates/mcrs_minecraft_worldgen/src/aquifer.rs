//! Underground water and lava placement.
//!
//! The noise based sampler scatters one anchor per 16x12x16 grid cell, gives every anchor a
//! fluid level, and decides for each open block which level it belongs to. Where two levels
//! meet, barrier noise plus the vertical gap between them pushes the density back towards
//! solid, so neighbouring pockets are separated by rock instead of mixing.

use crate::block::BlockState;
use crate::density_function::DensityFunction;
use crate::density_function::cache::PreliminarySurface;
use crate::density_function::router::NoiseRouter;
use crate::math::{clamped_map, floor_div, map};
use bevy_math::IVec3;
use mcrs_random::Random;
use mcrs_random::positional::RandomSplitter;
use std::sync::{Arc, LazyLock};

static AIR: LazyLock<BlockState> = LazyLock::new(BlockState::air);
static LAVA: LazyLock<BlockState> = LazyLock::new(BlockState::lava);

const X_SPACING: i32 = 16;
const Y_SPACING: i32 = 12;
const Z_SPACING: i32 = 16;
const X_RANGE: i32 = 10;
const Y_RANGE: i32 = 9;
const Z_RANGE: i32 = 10;

/// Level returned for anchors that hold no fluid at all.
pub const WAY_BELOW_MIN_Y: i32 = -32512;

const LAVA_LEVEL: i32 = -54;

const FLOWING_UPDATE_SIMILARITY: f64 = similarity(10 * 10, 12 * 12);

const SURFACE_SAMPLING_OFFSETS_IN_CHUNKS: [(i32, i32); 13] = [
    (0, 0),
    (-2, -1),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-3, 0),
    (-2, 0),
    (-1, 0),
    (1, 0),
    (-2, 1),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A fluid surface: `state` fills every block strictly below `y`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FluidLevel {
    y: i32,
    state: BlockState,
}

impl FluidLevel {
    pub fn new(y: i32, state: BlockState) -> Self {
        Self { y, state }
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn state(&self) -> &BlockState {
        &self.state
    }

    pub fn at(&self, y: i32) -> &BlockState {
        if y < self.y { &self.state } else { &AIR }
    }
}

/// Supplies the fluid level a position would have without any aquifer.
pub trait FluidPicker {
    fn compute_fluid(&self, x: i32, y: i32, z: i32) -> &FluidLevel;
}

/// Default fluid up to sea level, lava below `min(-54, sea_level)`.
#[derive(Clone, Debug)]
pub struct SeaLevelFluidPicker {
    lava: FluidLevel,
    sea: FluidLevel,
}

impl SeaLevelFluidPicker {
    pub fn new(sea_level: i32, default_fluid: BlockState) -> Self {
        Self {
            lava: FluidLevel::new(LAVA_LEVEL, LAVA.clone()),
            sea: FluidLevel::new(sea_level, default_fluid),
        }
    }
}

impl FluidPicker for SeaLevelFluidPicker {
    fn compute_fluid(&self, _x: i32, y: i32, _z: i32) -> &FluidLevel {
        if y < LAVA_LEVEL.min(self.sea.y) {
            &self.lava
        } else {
            &self.sea
        }
    }
}

/// Decides the fluid override for open blocks of one chunk.
///
/// An instance belongs to a single chunk pass: `apply` fills per-chunk caches and sets the
/// flag read back by [`AquiferSampler::needs_fluid_tick`].
pub enum AquiferSampler<P: FluidPicker = SeaLevelFluidPicker> {
    Disabled { picker: P },
    NoiseBased(Box<NoiseBasedAquifer<P>>),
}

impl<P: FluidPicker> AquiferSampler<P> {
    pub fn new(
        chunk_x: i32,
        chunk_z: i32,
        min_y: i32,
        height: i32,
        splitter: RandomSplitter,
        router: &NoiseRouter,
        picker: P,
    ) -> Self {
        AquiferSampler::NoiseBased(Box::new(NoiseBasedAquifer::new(
            chunk_x, chunk_z, min_y, height, splitter, router, picker,
        )))
    }

    /// Sea level behaviour only, for dimensions generated without aquifers.
    pub fn disabled(picker: P) -> Self {
        AquiferSampler::Disabled { picker }
    }

    pub fn picker(&self) -> &P {
        match self {
            AquiferSampler::Disabled { picker } => picker,
            AquiferSampler::NoiseBased(aquifer) => &aquifer.picker,
        }
    }

    /// Returns `None` when the block stays solid, otherwise the fluid or air to place.
    pub fn apply(&mut self, pos: IVec3, density: f64) -> Option<BlockState> {
        match self {
            AquiferSampler::Disabled { picker } => {
                if density > 0.0 {
                    None
                } else {
                    Some(picker.compute_fluid(pos.x, pos.y, pos.z).at(pos.y).clone())
                }
            }
            AquiferSampler::NoiseBased(aquifer) => aquifer.apply(pos, density),
        }
    }

    /// Whether the block from the last `apply` call needs a scheduled fluid update.
    pub fn needs_fluid_tick(&self) -> bool {
        match self {
            AquiferSampler::Disabled { .. } => false,
            AquiferSampler::NoiseBased(aquifer) => aquifer.tick,
        }
    }
}

pub struct NoiseBasedAquifer<P> {
    picker: P,
    barrier: Arc<DensityFunction>,
    floodedness: Arc<DensityFunction>,
    spread: Arc<DensityFunction>,
    lava: Arc<DensityFunction>,
    erosion: Arc<DensityFunction>,
    depth: Arc<DensityFunction>,
    surface: PreliminarySurface,
    splitter: RandomSplitter,
    min_grid: IVec3,
    grid_size: IVec3,
    anchors: Vec<Option<IVec3>>,
    statuses: Vec<Option<FluidLevel>>,
    tick: bool,
}

impl<P: FluidPicker> NoiseBasedAquifer<P> {
    fn new(
        chunk_x: i32,
        chunk_z: i32,
        min_y: i32,
        height: i32,
        splitter: RandomSplitter,
        router: &NoiseRouter,
        picker: P,
    ) -> Self {
        let min_grid = IVec3::new(
            grid_x(chunk_x * 16) - 1,
            grid_y(min_y) - 1,
            grid_z(chunk_z * 16) - 1,
        );
        let max_grid = IVec3::new(
            grid_x(chunk_x * 16 + 15) + 1,
            grid_y(min_y + height) + 1,
            grid_z(chunk_z * 16 + 15) + 1,
        );
        let grid_size = max_grid - min_grid + IVec3::ONE;
        let len = (grid_size.x * grid_size.y * grid_size.z) as usize;
        Self {
            picker,
            barrier: router.barrier.clone(),
            floodedness: router.fluid_level_floodedness.clone(),
            spread: router.fluid_level_spread.clone(),
            lava: router.lava.clone(),
            erosion: router.erosion.clone(),
            depth: router.depth.clone(),
            surface: PreliminarySurface::new(router.preliminary_surface_level.clone()),
            splitter,
            min_grid,
            grid_size,
            anchors: vec![None; len],
            statuses: vec![None; len],
            tick: false,
        }
    }

    fn apply(&mut self, pos: IVec3, density: f64) -> Option<BlockState> {
        let IVec3 { x, y, z } = pos;
        if density > 0.0 {
            self.tick = false;
            return None;
        }
        let global = self.picker.compute_fluid(x, y, z).at(y);
        if global.is("minecraft:lava") {
            self.tick = false;
            return Some(global.clone());
        }

        let cell_x = floor_div(x - 5, X_SPACING);
        let cell_y = floor_div(y + 1, Y_SPACING);
        let cell_z = floor_div(z - 5, Z_SPACING);
        let mut nearest = [(i32::MAX, IVec3::ZERO); 4];
        for dx in 0..=1 {
            for dy in -1..=1 {
                for dz in 0..=1 {
                    let anchor = self.anchor(cell_x + dx, cell_y + dy, cell_z + dz);
                    let distance = (anchor - pos).length_squared();
                    if let Some(slot) = nearest.iter().position(|(d, _)| *d >= distance) {
                        nearest.copy_within(slot..3, slot + 1);
                        nearest[slot] = (distance, anchor);
                    }
                }
            }
        }
        let [(d1, a1), (d2, a2), (d3, a3), (d4, a4)] = nearest;

        let first = self.status(a1);
        let similarity12 = similarity(d1, d2);
        let state = first.at(y).clone();
        if similarity12 <= 0.0 {
            self.tick = similarity12 >= FLOWING_UPDATE_SIMILARITY && a1 != a2;
            return Some(state);
        }
        if state.is("minecraft:water")
            && self
                .picker
                .compute_fluid(x, y - 1, z)
                .at(y - 1)
                .is("minecraft:lava")
        {
            self.tick = true;
            return Some(state);
        }

        let mut barrier = None;
        let second = self.status(a2);
        let pressure = similarity12 * self.pressure(pos, &mut barrier, &first, &second);
        if density + pressure > 0.0 {
            self.tick = false;
            return None;
        }
        let third = self.status(a3);
        let similarity13 = similarity(d1, d3);
        if similarity13 > 0.0 {
            let pressure =
                similarity12 * similarity13 * self.pressure(pos, &mut barrier, &first, &third);
            if density + pressure > 0.0 {
                self.tick = false;
                return None;
            }
        }
        let similarity23 = similarity(d2, d3);
        if similarity23 > 0.0 {
            let pressure =
                similarity12 * similarity23 * self.pressure(pos, &mut barrier, &second, &third);
            if density + pressure > 0.0 {
                self.tick = false;
                return None;
            }
        }

        // Levels belong to anchors: two anchors are two bodies of fluid even at equal height.
        self.tick = a1 != a2
            || (similarity23 >= FLOWING_UPDATE_SIMILARITY && a2 != a3)
            || (similarity13 >= FLOWING_UPDATE_SIMILARITY && a1 != a3)
            || (similarity13 >= FLOWING_UPDATE_SIMILARITY
                && similarity(d1, d4) >= FLOWING_UPDATE_SIMILARITY
                && a1 != a4);
        Some(state)
    }

    fn index(&self, grid_x: i32, grid_y: i32, grid_z: i32) -> Option<usize> {
        let local = IVec3::new(grid_x, grid_y, grid_z) - self.min_grid;
        if local.cmplt(IVec3::ZERO).any() || local.cmpge(self.grid_size).any() {
            return None;
        }
        Some(((local.y * self.grid_size.z + local.z) * self.grid_size.x + local.x) as usize)
    }

    fn anchor(&mut self, grid_x: i32, grid_y: i32, grid_z: i32) -> IVec3 {
        let index = self.index(grid_x, grid_y, grid_z);
        if let Some(anchor) = index.and_then(|i| self.anchors[i]) {
            return anchor;
        }
        let mut random = self.splitter.at(grid_x, grid_y, grid_z);
        let anchor = IVec3::new(
            grid_x * X_SPACING + random.next_i32_bound(X_RANGE),
            grid_y * Y_SPACING + random.next_i32_bound(Y_RANGE),
            grid_z * Z_SPACING + random.next_i32_bound(Z_RANGE),
        );
        if let Some(i) = index {
            self.anchors[i] = Some(anchor);
        }
        anchor
    }

    fn status(&mut self, anchor: IVec3) -> FluidLevel {
        let index = self.index(grid_x(anchor.x), grid_y(anchor.y), grid_z(anchor.z));
        if let Some(Some(level)) = index.map(|i| &self.statuses[i]) {
            return level.clone();
        }
        let level = self.compute_fluid(anchor);
        if let Some(i) = index {
            self.statuses[i] = Some(level.clone());
        }
        level
    }

    fn pressure(
        &self,
        pos: IVec3,
        barrier: &mut Option<f64>,
        first: &FluidLevel,
        second: &FluidLevel,
    ) -> f64 {
        let y = pos.y;
        let a = first.at(y);
        let b = second.at(y);
        if (a.is("minecraft:lava") && b.is("minecraft:water"))
            || (a.is("minecraft:water") && b.is("minecraft:lava"))
        {
            return 2.0;
        }
        let gap = (first.y - second.y).abs();
        if gap == 0 {
            return 0.0;
        }
        let middle = 0.5 * (first.y + second.y) as f64;
        let offset = y as f64 + 0.5 - middle;
        let room = gap as f64 / 2.0 - offset.abs();
        let slope = if offset > 0.0 {
            if room > 0.0 { room / 1.5 } else { room / 2.5 }
        } else {
            let room = 3.0 + room;
            if room > 0.0 { room / 3.0 } else { room / 10.0 }
        };
        let noise = if (-2.0..=2.0).contains(&slope) {
            *barrier.get_or_insert_with(|| self.barrier.sample(pos))
        } else {
            0.0
        };
        2.0 * (noise + slope)
    }

    fn compute_fluid(&mut self, pos: IVec3) -> FluidLevel {
        let IVec3 { x, y, z } = pos;
        let global = self.picker.compute_fluid(x, y, z).clone();
        let mut min_surface = i32::MAX;
        let mut flooded = false;
        for (chunk_dx, chunk_dz) in SURFACE_SAMPLING_OFFSETS_IN_CHUNKS {
            let sample_x = x + chunk_dx * 16;
            let sample_z = z + chunk_dz * 16;
            let surface = self.surface.level(sample_x, sample_z);
            let fluid_top = surface + 8;
            let center = chunk_dx == 0 && chunk_dz == 0;
            if center && y - 12 > fluid_top {
                return global;
            }
            let above = y + 12 > fluid_top;
            if above || center {
                let level = self.picker.compute_fluid(sample_x, fluid_top, sample_z);
                if !level.at(fluid_top).is_air() {
                    if center {
                        flooded = true;
                    }
                    if above {
                        return level.clone();
                    }
                }
            }
            min_surface = min_surface.min(surface);
        }
        let level = self.surface_level(pos, &global, min_surface, flooded);
        let state = self.fluid_type(pos, &global, level);
        FluidLevel::new(level, state)
    }

    fn surface_level(&self, pos: IVec3, global: &FluidLevel, min_surface: i32, flooded: bool) -> i32 {
        let (partially_flooded, fully_flooded) = if self.is_deep_dark(pos) {
            (-1.0, -1.0)
        } else {
            let exposure = if flooded {
                clamped_map((min_surface + 8 - pos.y) as f64, 0.0, 64.0, 1.0, 0.0)
            } else {
                0.0
            };
            let floodedness = self.floodedness.sample(pos).clamp(-1.0, 1.0);
            let full = map(exposure, 1.0, 0.0, -0.3, 0.8);
            let partial = map(exposure, 1.0, 0.0, -0.8, 0.4);
            (floodedness - partial, floodedness - full)
        };
        if fully_flooded > 0.0 {
            global.y
        } else if partially_flooded > 0.0 {
            self.randomized_surface_level(pos, min_surface)
        } else {
            WAY_BELOW_MIN_Y
        }
    }

    fn is_deep_dark(&self, pos: IVec3) -> bool {
        self.erosion.sample(pos) < (-0.225f32) as f64 && self.depth.sample(pos) > 0.9f32 as f64
    }

    fn randomized_surface_level(&self, pos: IVec3, min_surface: i32) -> i32 {
        let cell = IVec3::new(floor_div(pos.x, 16), floor_div(pos.y, 40), floor_div(pos.z, 16));
        let base = cell.y * 40 + 20;
        let spread = self.spread.sample(cell) * 10.0;
        let offset = (spread / 3.0).floor() as i32 * 3;
        min_surface.min(base + offset)
    }

    fn fluid_type(&self, pos: IVec3, global: &FluidLevel, level: i32) -> BlockState {
        if level <= -10 && level != WAY_BELOW_MIN_Y && !global.state.is("minecraft:lava") {
            let cell = IVec3::new(floor_div(pos.x, 64), floor_div(pos.y, 40), floor_div(pos.z, 64));
            if self.lava.sample(cell).abs() > 0.3 {
                return LAVA.clone();
            }
        }
        global.state.clone()
    }
}

const fn similarity(first: i32, second: i32) -> f64 {
    1.0 - (second - first).abs() as f64 / 25.0
}

fn grid_x(x: i32) -> i32 {
    floor_div(x, X_SPACING)
}

fn grid_y(y: i32) -> i32 {
    floor_div(y, Y_SPACING)
}

fn grid_z(z: i32) -> i32 {
    floor_div(z, Z_SPACING)
}
