use crate::block::BlockState;
use crate::density_function::cache::PreliminarySurface;
use crate::math::{floor, lerp2, map};
use crate::surface::{Condition, Rule, SurfaceChunk, SurfaceRules, SurfaceSystem};
use bevy_math::IVec3;
use mcrs_random::Random;
use std::sync::Arc;

/// A value memoized for one phase, identified by the stamp it was computed at.
#[derive(Clone, Debug, Default)]
pub struct Cached<T> {
    value: Option<T>,
    stamp: u64,
}

impl<T: Clone> Cached<T> {
    pub fn get(&self, stamp: u64) -> Option<T> {
        if self.stamp == stamp { self.value.clone() } else { None }
    }

    pub fn set(&mut self, stamp: u64, value: T) -> T {
        self.stamp = stamp;
        self.value = Some(value.clone());
        value
    }

    pub fn get_or_update(&mut self, stamp: u64, compute: impl FnOnce() -> T) -> T {
        match self.get(stamp) {
            Some(value) => value,
            None => self.set(stamp, compute()),
        }
    }
}

/// Mutable cursor the surface rules run against, reused for every column of a chunk.
///
/// Column state is only reachable through [`ColumnContext`] and block state only through
/// [`BlockContext`], so rules cannot run before both phases are initialised.
pub struct MaterialRuleContext<'a> {
    system: &'a SurfaceSystem,
    rules: &'a SurfaceRules,
    surface: PreliminarySurface,
    stamp: u64,
    column_stamp: u64,
    block_stamp: u64,
    column: Option<(i32, i32)>,
    x: i32,
    z: i32,
    y: i32,
    surface_depth: i32,
    stone_depth_above: i32,
    stone_depth_below: i32,
    water_height: i32,
    surface_secondary: Cached<f64>,
    min_surface_level: Cached<i32>,
    preliminary_cell: Option<(i32, i32)>,
    preliminary_corners: [i32; 4],
    biome: Cached<Arc<str>>,
    temperature: Cached<bool>,
    steep: Cached<bool>,
    slots: Vec<Cached<bool>>,
}

impl<'a> MaterialRuleContext<'a> {
    pub fn new(system: &'a SurfaceSystem, rules: &'a SurfaceRules, surface: PreliminarySurface) -> Self {
        Self {
            system,
            rules,
            surface,
            stamp: 0,
            column_stamp: 0,
            block_stamp: 0,
            column: None,
            x: 0,
            z: 0,
            y: 0,
            surface_depth: 0,
            stone_depth_above: 0,
            stone_depth_below: 0,
            water_height: i32::MIN,
            surface_secondary: Cached::default(),
            min_surface_level: Cached::default(),
            preliminary_cell: None,
            preliminary_corners: [0; 4],
            biome: Cached::default(),
            temperature: Cached::default(),
            steep: Cached::default(),
            slots: vec![Cached::default(); rules.slot_count()],
        }
    }

    pub fn system(&self) -> &'a SurfaceSystem {
        self.system
    }

    pub fn column_stamp(&self) -> u64 {
        self.column_stamp
    }

    pub fn block_stamp(&self) -> u64 {
        self.block_stamp
    }

    fn next_stamp(&mut self) -> u64 {
        self.stamp += 1;
        self.stamp
    }

    /// Moves to column `(x, z)`. Re-entering the current column keeps its memoized values.
    pub fn init_horizontal<'c, C>(&'c mut self, chunk: &'c C, x: i32, z: i32) -> ColumnContext<'c, 'a, C>
    where
        C: SurfaceChunk + ?Sized,
    {
        if self.column != Some((x, z)) {
            self.column = Some((x, z));
            self.column_stamp = self.next_stamp();
            self.x = x;
            self.z = z;
            self.surface_depth = self.system.surface_depth(x, z);
        }
        ColumnContext { context: self, chunk }
    }
}

/// A context positioned on a column.
pub struct ColumnContext<'c, 'a, C: ?Sized> {
    context: &'c mut MaterialRuleContext<'a>,
    chunk: &'c C,
}

impl<'a, C: SurfaceChunk + ?Sized> ColumnContext<'_, 'a, C> {
    pub fn surface_depth(&self) -> i32 {
        self.context.surface_depth
    }

    /// Moves to block `y` of the column with the depths the column walk has counted so far.
    pub fn init_vertical(
        &mut self,
        stone_depth_above: i32,
        stone_depth_below: i32,
        water_height: i32,
        y: i32,
    ) -> BlockContext<'_, 'a, C> {
        let context = &mut *self.context;
        context.block_stamp = context.next_stamp();
        context.y = y;
        context.stone_depth_above = stone_depth_above;
        context.stone_depth_below = stone_depth_below;
        context.water_height = water_height;
        BlockContext {
            context,
            chunk: self.chunk,
        }
    }
}

/// A context positioned on one block; the only phase that can run rules.
pub struct BlockContext<'b, 'a, C: ?Sized> {
    context: &'b mut MaterialRuleContext<'a>,
    chunk: &'b C,
}

impl<C: SurfaceChunk + ?Sized> BlockContext<'_, '_, C> {
    pub fn pos(&self) -> IVec3 {
        IVec3::new(self.context.x, self.context.y, self.context.z)
    }

    /// Runs the compiled rules; `None` keeps the block as it is.
    pub fn apply(&mut self) -> Option<BlockState> {
        let rules = self.context.rules;
        self.run(rules.root())
    }

    fn run(&mut self, rule: &Rule) -> Option<BlockState> {
        match rule {
            Rule::Block(state) => Some(state.clone()),
            Rule::Sequence(rules) => rules.iter().find_map(|rule| self.run(rule)),
            Rule::Condition { condition, then_run } => {
                if self.test(condition) {
                    self.run(then_run)
                } else {
                    None
                }
            }
            Rule::Bandlands => {
                let IVec3 { x, y, z } = self.pos();
                Some(self.context.system.band(x, y, z))
            }
        }
    }

    fn test(&mut self, condition: &Condition) -> bool {
        let pos = self.pos();
        let chunk = self.chunk;
        let context = &mut *self.context;
        match condition {
            Condition::Biome { slot, biomes } => {
                let stamp = context.block_stamp;
                if let Some(value) = context.slots[*slot].get(stamp) {
                    return value;
                }
                let biome = context.biome.get_or_update(stamp, || chunk.biome(pos));
                context.slots[*slot].set(stamp, biomes.iter().any(|name| **name == *biome))
            }
            Condition::NoiseThreshold { slot, noise, min, max } => {
                context.slots[*slot].get_or_update(context.column_stamp, || {
                    let value = noise.get(pos.x as f64, 0.0, pos.z as f64);
                    value >= *min && value <= *max
                })
            }
            Condition::VerticalGradient {
                slot,
                random,
                true_at_and_below,
                false_at_and_above,
            } => context.slots[*slot].get_or_update(context.block_stamp, || {
                if pos.y <= *true_at_and_below {
                    return true;
                }
                if pos.y >= *false_at_and_above {
                    return false;
                }
                let chance = map(
                    pos.y as f64,
                    *true_at_and_below as f64,
                    *false_at_and_above as f64,
                    1.0,
                    0.0,
                );
                (random.at(pos.x, pos.y, pos.z).next_f32() as f64) < chance
            }),
            Condition::YAbove {
                anchor,
                surface_depth_multiplier,
                add_stone_depth,
            } => {
                let stone = if *add_stone_depth { context.stone_depth_above } else { 0 };
                pos.y + stone >= anchor + context.surface_depth * surface_depth_multiplier
            }
            Condition::Water {
                offset,
                surface_depth_multiplier,
                add_stone_depth,
            } => {
                if context.water_height == i32::MIN {
                    return true;
                }
                let stone = if *add_stone_depth { context.stone_depth_above } else { 0 };
                pos.y + stone >= context.water_height + offset + context.surface_depth * surface_depth_multiplier
            }
            Condition::Temperature => {
                let stamp = context.block_stamp;
                if let Some(value) = context.temperature.get(stamp) {
                    return value;
                }
                let biome = context.biome.get_or_update(stamp, || chunk.biome(pos));
                let sea_level = context.system.sea_level();
                context
                    .temperature
                    .set(stamp, chunk.cold_enough_to_snow(&biome, pos, sea_level))
            }
            Condition::Steep => context
                .steep
                .get_or_update(context.column_stamp, || is_steep(chunk, pos.x & 15, pos.z & 15)),
            Condition::Not(inner) => !self.test(inner),
            Condition::Hole => context.surface_depth <= 0,
            Condition::AbovePreliminarySurface => pos.y >= context.min_surface_level(),
            Condition::StoneDepth {
                offset,
                add_surface_depth,
                secondary_depth_range,
                ceiling,
            } => {
                let depth = if *ceiling {
                    context.stone_depth_below
                } else {
                    context.stone_depth_above
                };
                let surface = if *add_surface_depth { context.surface_depth } else { 0 };
                let secondary = if *secondary_depth_range == 0 {
                    0
                } else {
                    map(
                        context.surface_secondary(),
                        -1.0,
                        1.0,
                        0.0,
                        *secondary_depth_range as f64,
                    ) as i32
                };
                depth <= 1 + offset + surface + secondary
            }
        }
    }
}

impl MaterialRuleContext<'_> {
    fn surface_secondary(&mut self) -> f64 {
        let (system, x, z) = (self.system, self.x, self.z);
        self.surface_secondary
            .get_or_update(self.column_stamp, || system.surface_secondary(x, z))
    }

    /// Interpolated preliminary surface of the 16-block cell around the column, minus slack.
    fn min_surface_level(&mut self) -> i32 {
        if let Some(level) = self.min_surface_level.get(self.column_stamp) {
            return level;
        }
        let cell = (self.x >> 4, self.z >> 4);
        if self.preliminary_cell != Some(cell) {
            self.preliminary_cell = Some(cell);
            let (cell_x, cell_z) = (cell.0 << 4, cell.1 << 4);
            self.preliminary_corners = [
                self.surface.level(cell_x, cell_z),
                self.surface.level(cell_x + 16, cell_z),
                self.surface.level(cell_x, cell_z + 16),
                self.surface.level(cell_x + 16, cell_z + 16),
            ];
        }
        let [c00, c10, c01, c11] = self.preliminary_corners;
        let level = floor(lerp2(
            ((self.x & 15) as f32 / 16.0) as f64,
            ((self.z & 15) as f32 / 16.0) as f64,
            c00 as f64,
            c10 as f64,
            c01 as f64,
            c11 as f64,
        ));
        self.min_surface_level
            .set(self.column_stamp, level + self.surface_depth - 8)
    }
}

fn is_steep<C: SurfaceChunk + ?Sized>(chunk: &C, local_x: i32, local_z: i32) -> bool {
    let north = chunk.surface_height(local_x, (local_z - 1).max(0));
    let south = chunk.surface_height(local_x, (local_z + 1).min(15));
    if south >= north + 4 {
        return true;
    }
    let west = chunk.surface_height((local_x - 1).max(0), local_z);
    let east = chunk.surface_height((local_x + 1).min(15), local_z);
    west >= east + 4
}

#[cfg(test)]
mod test {
    use crate::block::BlockState;
    use crate::density_function::DensityFunction;
    use crate::density_function::cache::PreliminarySurface;
    use crate::density_function::test::bound_noise;
    use crate::math::lerp2;
    use crate::surface::context::{Cached, MaterialRuleContext};
    use crate::surface::test::{TestChunk, compile};

    #[test]
    fn cached_values_follow_stamps() {
        let mut cached = Cached::default();
        let mut computed = 0;
        for stamp in [1, 1, 2, 2, 2, 3] {
            cached.get_or_update(stamp, || {
                computed += 1;
                stamp * 10
            });
        }
        assert_eq!(computed, 3);
        assert_eq!(cached.get(3), Some(30));
        assert_eq!(cached.get(2), None);
    }

    #[test]
    fn reentering_a_column_keeps_its_stamp() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:block", "result_state": {"Name": "minecraft:dirt"}
        }));
        let chunk = TestChunk::new(|_, _| 64, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        let depth = context.init_horizontal(&chunk, 3, 4).surface_depth();
        let stamp = context.column_stamp();
        assert_eq!(context.init_horizontal(&chunk, 3, 4).surface_depth(), depth);
        assert_eq!(context.column_stamp(), stamp);
        context.init_horizontal(&chunk, 4, 4);
        assert!(context.column_stamp() > stamp);
    }

    #[test]
    fn every_block_gets_a_fresh_stamp() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:block", "result_state": {"Name": "minecraft:dirt"}
        }));
        let chunk = TestChunk::new(|_, _| 64, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        let mut column = context.init_horizontal(&chunk, 0, 0);
        let mut stamps = Vec::new();
        for y in (50..60).rev() {
            let mut block = column.init_vertical(60 - y, 10, i32::MIN, y);
            assert_eq!(block.apply(), Some(BlockState::new("minecraft:dirt")));
            stamps.push(block.context.block_stamp);
        }
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn column_conditions_are_computed_once_per_column() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:condition",
            "if_true": {"type": "minecraft:steep"},
            "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:stone"}}
        }));
        let chunk = TestChunk::new(|x, _| 60 + x * 2, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        for x in [2, 2, 7] {
            let before = chunk.height_reads.get();
            let mut column = context.init_horizontal(&chunk, x, 5);
            for y in (40..60).rev() {
                let mut block = column.init_vertical(60 - y, 5, i32::MIN, y);
                assert_eq!(block.apply(), None);
            }
            let reads = chunk.height_reads.get() - before;
            if before == 0 {
                assert_eq!(reads, 4);
            } else if x == 2 {
                assert_eq!(reads, 0);
            }
        }
    }

    #[test]
    fn steep_slopes_are_detected() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:condition",
            "if_true": {"type": "minecraft:steep"},
            "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:stone"}}
        }));
        let chunk = TestChunk::new(|_, z| 60 + z * 3, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        let mut column = context.init_horizontal(&chunk, 5, 5);
        assert!(column.init_vertical(1, 1, i32::MIN, 74).apply().is_some());
        let flat = TestChunk::new(|_, _| 60, 63);
        let mut column = context.init_horizontal(&flat, 6, 5);
        assert!(column.init_vertical(1, 1, i32::MIN, 59).apply().is_none());
    }

    #[test]
    fn block_conditions_are_recomputed_per_block() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:sequence",
            "sequence": [
                {"type": "minecraft:condition",
                 "if_true": {"type": "minecraft:biome", "biome_is": ["desert"]},
                 "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:sand"}}},
                {"type": "minecraft:condition",
                 "if_true": {"type": "minecraft:biome", "biome_is": ["minecraft:plains"]},
                 "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:grass_block"}}}
            ]
        }));
        let chunk = TestChunk::new(|_, _| 64, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        let mut column = context.init_horizontal(&chunk, 1, 1);
        for y in (50..60).rev() {
            let mut block = column.init_vertical(60 - y, 10, i32::MIN, y);
            assert_eq!(block.apply(), Some(BlockState::new("minecraft:grass_block")));
        }
        assert_eq!(chunk.biome_reads.get(), 10);
    }

    #[test]
    fn conditions_read_depths_and_water() {
        let (rules, system, surface) = compile(serde_json::json!({
            "type": "minecraft:sequence",
            "sequence": [
                {"type": "minecraft:condition",
                 "if_true": {"type": "minecraft:not", "invert": {"type": "minecraft:water", "offset": 0,
                             "surface_depth_multiplier": 0, "add_stone_depth": false}},
                 "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:gravel"}}},
                {"type": "minecraft:condition",
                 "if_true": {"type": "minecraft:stone_depth", "offset": 2, "add_surface_depth": false,
                             "secondary_depth_range": 0, "surface_type": "ceiling"},
                 "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:sandstone"}}},
                {"type": "minecraft:condition",
                 "if_true": {"type": "minecraft:y_above", "anchor": {"absolute": 55},
                             "surface_depth_multiplier": 0, "add_stone_depth": true},
                 "then_run": {"type": "minecraft:block", "result_state": {"Name": "minecraft:dirt"}}}
            ]
        }));
        let chunk = TestChunk::new(|_, _| 64, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, surface);
        let mut column = context.init_horizontal(&chunk, 0, 0);
        let gravel = column.init_vertical(1, 10, 70, 60).apply();
        assert_eq!(gravel, Some(BlockState::new("minecraft:gravel")));
        let sandstone = column.init_vertical(1, 3, i32::MIN, 60).apply();
        assert_eq!(sandstone, Some(BlockState::new("minecraft:sandstone")));
        let dirt = column.init_vertical(3, 10, i32::MIN, 53).apply();
        assert_eq!(dirt, Some(BlockState::new("minecraft:dirt")));
        let none = column.init_vertical(1, 10, i32::MIN, 50).apply();
        assert_eq!(none, None);
    }

    #[test]
    fn min_surface_level_blends_the_sixteen_block_corners() {
        let (rules, system, _) = compile(serde_json::json!({
            "type": "minecraft:block", "result_state": {"Name": "minecraft:dirt"}
        }));
        let noise = DensityFunction::noise(bound_noise(9, "surface", -6, vec![1.0]), 1.0, 0.0);
        let level = DensityFunction::add(
            DensityFunction::constant(64.0),
            DensityFunction::mul(DensityFunction::constant(24.0), noise),
        );
        let mut corners = PreliminarySurface::new(level.clone());
        let chunk = TestChunk::new(|_, _| 64, 63);
        let mut context = MaterialRuleContext::new(&system, &rules, PreliminarySurface::new(level));
        let mut differs = false;
        for (x, z) in [(0, 0), (5, 11), (15, 15), (16, 3), (-1, -7), (-21, 30), (40, -33)] {
            context.init_horizontal(&chunk, x, z);
            let (cell_x, cell_z) = ((x >> 4) << 4, (z >> 4) << 4);
            let [c00, c10, c01, c11] = [
                corners.level(cell_x, cell_z),
                corners.level(cell_x + 16, cell_z),
                corners.level(cell_x, cell_z + 16),
                corners.level(cell_x + 16, cell_z + 16),
            ];
            differs |= c00 != c10 || c00 != c01 || c00 != c11;
            let blended = lerp2(
                (x & 15) as f64 / 16.0,
                (z & 15) as f64 / 16.0,
                c00 as f64,
                c10 as f64,
                c01 as f64,
                c11 as f64,
            )
            .floor() as i32;
            let expected = blended + context.surface_depth - 8;
            assert_eq!(context.min_surface_level(), expected, "column {x} {z}");
            if x & 15 == 0 && z & 15 == 0 {
                assert_eq!(expected, corners.level(x, z) + context.surface_depth - 8);
            }
        }
        assert!(differs);
    }
}
