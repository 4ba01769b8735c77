use crate::density_function::{DensityFunction, Marker, MarkerKind, SampleContext};
use crate::math::{floor, floor_div, lerp, quart_from_block, quart_to_block};
use bevy_math::IVec3;
use rustc_hash::FxHashMap;
use std::sync::Arc;

enum Slot {
    Once { pos: IVec3, value: f64 },
    Column { x: i32, z: i32, value: f64 },
    Flat(FxHashMap<(i32, i32), f64>),
    Cell { origin: IVec3, values: Vec<Option<f64>> },
    Interpolated { origin: IVec3, corners: [f64; 8] },
}

/// Per-chunk evaluation context that gives caching markers their behaviour.
///
/// One instance belongs to one generation pass; it is not shared between threads.
pub struct ChunkCache {
    cell_width: i32,
    cell_height: i32,
    slots: FxHashMap<u64, Slot>,
}

impl ChunkCache {
    /// `cell_width`/`cell_height` are in blocks and must be positive.
    pub fn new(cell_width: i32, cell_height: i32) -> Self {
        Self {
            cell_width: cell_width.max(1),
            cell_height: cell_height.max(1),
            slots: FxHashMap::default(),
        }
    }

    pub fn cell_width(&self) -> i32 {
        self.cell_width
    }

    pub fn cell_height(&self) -> i32 {
        self.cell_height
    }

    /// Forgets every cached value.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn sample(&mut self, function: &DensityFunction, pos: IVec3) -> f64 {
        function.compute(pos, self)
    }

    pub fn fill(&mut self, function: &DensityFunction, out: &mut [f64], positions: &[IVec3]) {
        function.fill_in(out, positions, self)
    }

    fn cell_origin(&self, pos: IVec3) -> IVec3 {
        IVec3::new(
            floor_div(pos.x, self.cell_width) * self.cell_width,
            floor_div(pos.y, self.cell_height) * self.cell_height,
            floor_div(pos.z, self.cell_width) * self.cell_width,
        )
    }

    fn cache_once(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        if let Some(Slot::Once { pos: cached, value }) = self.slots.get(&marker.id)
            && *cached == pos
        {
            return *value;
        }
        let value = marker.input.compute(pos, self);
        self.slots.insert(marker.id, Slot::Once { pos, value });
        value
    }

    fn cache_2d(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        if let Some(Slot::Column { x, z, value }) = self.slots.get(&marker.id)
            && *x == pos.x
            && *z == pos.z
        {
            return *value;
        }
        let value = marker.input.compute(pos, self);
        self.slots.insert(
            marker.id,
            Slot::Column {
                x: pos.x,
                z: pos.z,
                value,
            },
        );
        value
    }

    fn flat_cache(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        if let Some(Slot::Flat(values)) = self.slots.get(&marker.id)
            && let Some(value) = values.get(&(pos.x, pos.z))
        {
            return *value;
        }
        let value = marker.input.compute(IVec3::new(pos.x, 0, pos.z), self);
        let slot = self
            .slots
            .entry(marker.id)
            .or_insert_with(|| Slot::Flat(FxHashMap::default()));
        if let Slot::Flat(values) = slot {
            values.insert((pos.x, pos.z), value);
        }
        value
    }

    fn cache_all_in_cell(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        let origin = self.cell_origin(pos);
        let local = pos - origin;
        let index = ((local.y * self.cell_width + local.z) * self.cell_width + local.x) as usize;
        if let Some(Slot::Cell {
            origin: cached,
            values,
        }) = self.slots.get(&marker.id)
            && *cached == origin
            && let Some(value) = values[index]
        {
            return value;
        }
        let value = marker.input.compute(pos, self);
        let size = (self.cell_width * self.cell_width * self.cell_height) as usize;
        let slot = self.slots.entry(marker.id).or_insert_with(|| Slot::Cell {
            origin,
            values: vec![None; size],
        });
        match slot {
            Slot::Cell {
                origin: cached,
                values,
            } if *cached == origin => values[index] = Some(value),
            _ => {
                let mut values = vec![None; size];
                values[index] = Some(value);
                *slot = Slot::Cell { origin, values };
            }
        }
        value
    }

    fn interpolated(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        let origin = self.cell_origin(pos);
        let cached = match self.slots.get(&marker.id) {
            Some(Slot::Interpolated {
                origin: cached,
                corners,
            }) if *cached == origin => Some(*corners),
            _ => None,
        };
        let corners = match cached {
            Some(corners) => corners,
            None => {
                let mut corners = [0.0; 8];
                for (i, corner) in corners.iter_mut().enumerate() {
                    let i = i as i32;
                    let offset = IVec3::new(
                        (i & 1) * self.cell_width,
                        (i >> 1 & 1) * self.cell_height,
                        (i >> 2 & 1) * self.cell_width,
                    );
                    *corner = marker.input.compute(origin + offset, self);
                }
                self.slots
                    .insert(marker.id, Slot::Interpolated { origin, corners });
                corners
            }
        };
        let local = pos - origin;
        let dx = local.x as f64 / self.cell_width as f64;
        let dy = local.y as f64 / self.cell_height as f64;
        let dz = local.z as f64 / self.cell_width as f64;
        // Corner index bits: x = 1, y = 2, z = 4. Interpolate along y, then x, then z.
        let x0z0 = lerp(dy, corners[0], corners[2]);
        let x1z0 = lerp(dy, corners[1], corners[3]);
        let x0z1 = lerp(dy, corners[4], corners[6]);
        let x1z1 = lerp(dy, corners[5], corners[7]);
        let z0 = lerp(dx, x0z0, x1z0);
        let z1 = lerp(dx, x0z1, x1z1);
        lerp(dz, z0, z1)
    }
}

impl SampleContext for ChunkCache {
    fn sample_marker(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        match marker.kind {
            MarkerKind::CacheOnce => self.cache_once(marker, pos),
            MarkerKind::Cache2D => self.cache_2d(marker, pos),
            MarkerKind::FlatCache => self.flat_cache(marker, pos),
            MarkerKind::CacheAllInCell => self.cache_all_in_cell(marker, pos),
            MarkerKind::Interpolated => self.interpolated(marker, pos),
        }
    }
}

/// Rough terrain height per column, snapped to quart columns and memoized.
pub struct PreliminarySurface {
    function: Arc<DensityFunction>,
    levels: FxHashMap<(i32, i32), i32>,
}

impl PreliminarySurface {
    pub fn new(function: Arc<DensityFunction>) -> Self {
        Self {
            function,
            levels: FxHashMap::default(),
        }
    }

    pub fn level(&mut self, x: i32, z: i32) -> i32 {
        let x = quart_to_block(quart_from_block(x));
        let z = quart_to_block(quart_from_block(z));
        let function = &self.function;
        *self
            .levels
            .entry((x, z))
            .or_insert_with(|| floor(function.sample(IVec3::new(x, 0, z))))
    }
}

#[cfg(test)]
mod test {
    use crate::density_function::cache::{ChunkCache, PreliminarySurface};
    use crate::density_function::test::{bound_noise, random_positions, sample_graph};
    use crate::density_function::{DensityFunction, MarkerKind, UnaryOp};
    use bevy_math::IVec3;

    const KINDS: [MarkerKind; 5] = [
        MarkerKind::CacheOnce,
        MarkerKind::Cache2D,
        MarkerKind::FlatCache,
        MarkerKind::CacheAllInCell,
        MarkerKind::Interpolated,
    ];

    fn column_positions(size: i32) -> Vec<IVec3> {
        let mut positions = Vec::new();
        for x in 0..size {
            for z in 0..size {
                for y in (-16..48).rev() {
                    positions.push(IVec3::new(x, y, z));
                }
            }
        }
        positions
    }

    #[test]
    fn exact_caches_are_transparent() {
        let positions = column_positions(4);
        for (name, function) in sample_graph(41) {
            for kind in [MarkerKind::CacheOnce, MarkerKind::CacheAllInCell] {
                let wrapped = DensityFunction::marker(kind, function.clone());
                let mut cache = ChunkCache::new(4, 8);
                for pos in &positions {
                    assert_eq!(
                        cache.sample(&wrapped, *pos).to_bits(),
                        function.sample(*pos).to_bits(),
                        "{name} in {kind:?} at {pos}"
                    );
                }
            }
        }
    }

    #[test]
    fn column_caches_are_transparent_for_columns() {
        let shift = bound_noise(3, "shift", -3, vec![1.0, 1.0, 1.0, 0.0]);
        let column = std::sync::Arc::new(DensityFunction::ShiftA(shift));
        let positions = column_positions(16);
        for kind in [MarkerKind::Cache2D, MarkerKind::FlatCache] {
            let wrapped = DensityFunction::marker(kind, column.clone());
            let mut cache = ChunkCache::new(4, 8);
            for pos in positions.iter().chain(&positions) {
                assert_eq!(cache.sample(&wrapped, *pos), column.sample(*pos), "{kind:?} at {pos}");
                assert_eq!(cache.sample(&wrapped, *pos), wrapped.sample(*pos));
            }
        }
    }

    #[test]
    fn flat_cache_reads_at_zero() {
        let gradient = DensityFunction::y_clamped_gradient(-64, 64, -1.0, 1.0);
        let wrapped = DensityFunction::marker(MarkerKind::FlatCache, gradient);
        let mut cache = ChunkCache::new(4, 8);
        assert_eq!(cache.sample(&wrapped, IVec3::new(1, 40, 1)), 0.0);
        assert_eq!(wrapped.sample(IVec3::new(1, 40, 1)), 0.0);
    }

    #[test]
    fn column_cache_keeps_the_first_height_of_a_column() {
        let gradient = DensityFunction::y_clamped_gradient(-64, 64, -1.0, 1.0);
        let wrapped = DensityFunction::marker(MarkerKind::Cache2D, gradient.clone());
        assert_eq!(wrapped.sample(IVec3::new(1, 40, 1)), gradient.sample(IVec3::new(1, 40, 1)));

        let mut cache = ChunkCache::new(4, 8);
        let first = cache.sample(&wrapped, IVec3::new(1, 40, 1));
        assert_eq!(first, gradient.sample(IVec3::new(1, 40, 1)));
        assert_eq!(cache.sample(&wrapped, IVec3::new(1, -10, 1)), first);
        let next = cache.sample(&wrapped, IVec3::new(2, -10, 1));
        assert_eq!(next, gradient.sample(IVec3::new(2, -10, 1)));
        assert_ne!(next, first);
    }

    #[test]
    fn exact_caches_follow_height() {
        let noise = DensityFunction::noise(bound_noise(17, "n", -4, vec![1.0, 0.5]), 1.0, 2.0);
        let gradient = DensityFunction::y_clamped_gradient(-16, 48, 2.0, -2.0);
        let function = DensityFunction::add(
            DensityFunction::mul(gradient, DensityFunction::unary(UnaryOp::Square, noise.clone())),
            noise,
        );
        let mut positions = column_positions(5);
        let upward: Vec<IVec3> = positions.iter().rev().copied().collect();
        positions.extend(upward);
        for kind in [MarkerKind::CacheOnce, MarkerKind::CacheAllInCell] {
            let wrapped = DensityFunction::marker(kind, function.clone());
            let mut cache = ChunkCache::new(4, 8);
            let mut heights_differ = false;
            for pair in positions.windows(2) {
                let (previous, pos) = (pair[0], pair[1]);
                let value = cache.sample(&wrapped, pos);
                assert_eq!(value.to_bits(), function.sample(pos).to_bits(), "{kind:?} at {pos}");
                if previous.x == pos.x && previous.z == pos.z {
                    heights_differ |= value != function.sample(previous);
                }
            }
            assert!(heights_differ);
        }
    }

    #[test]
    fn interpolation_is_exact_on_corners_and_linear_inputs() {
        let noise = DensityFunction::noise(bound_noise(8, "n", -5, vec![1.0, 1.0]), 1.0, 1.0);
        let wrapped = DensityFunction::marker(MarkerKind::Interpolated, noise.clone());
        let mut cache = ChunkCache::new(4, 8);
        for pos in random_positions(2, 500, 1000) {
            let corner = IVec3::new(pos.x & !3, pos.y & !7, pos.z & !3);
            let cached = cache.sample(&wrapped, corner);
            assert_eq!(format!("{:.10}", cached), format!("{:.10}", noise.sample(corner)));
        }

        let gradient = DensityFunction::y_clamped_gradient(-1000, 1000, -10.0, 10.0);
        let wrapped = DensityFunction::marker(MarkerKind::Interpolated, gradient.clone());
        for pos in random_positions(4, 500, 1000) {
            let cached = cache.sample(&wrapped, pos);
            assert!((cached - gradient.sample(pos)).abs() < 1.0e-9);
        }
    }

    /// Trilinear interpolation is a weighted mean of the cell corners, so it is never
    /// farther from the true value than the farthest corner is.
    #[test]
    fn interpolation_error_is_bounded_by_the_cell() {
        let noise = DensityFunction::noise(bound_noise(8, "n", -5, vec![1.0, 1.0]), 1.0, 1.0);
        let function = DensityFunction::add(
            DensityFunction::unary(UnaryOp::Square, noise),
            DensityFunction::y_clamped_gradient(-64, 320, 1.5, -1.5),
        );
        let wrapped = DensityFunction::marker(MarkerKind::Interpolated, function.clone());
        let mut cache = ChunkCache::new(4, 8);
        let mut largest_error: f64 = 0.0;
        for pos in random_positions(6, 2000, 1000) {
            if pos.x & 3 == 0 && pos.y & 7 == 0 && pos.z & 3 == 0 {
                continue;
            }
            let exact = function.sample(pos);
            let origin = IVec3::new(pos.x & !3, pos.y & !7, pos.z & !3);
            let mut corner_error: f64 = 0.0;
            for i in 0..8 {
                let corner = origin + IVec3::new((i & 1) * 4, (i >> 1 & 1) * 8, (i >> 2 & 1) * 4);
                corner_error = corner_error.max((function.sample(corner) - exact).abs());
            }
            let error = (cache.sample(&wrapped, pos) - exact).abs();
            assert!(error <= corner_error + 1.0e-12, "{error} > {corner_error} at {pos}");
            largest_error = largest_error.max(error);
        }
        assert!(largest_error > 0.0);
    }

    #[test]
    fn interpolation_stays_within_input_bounds() {
        let noise = DensityFunction::noise(bound_noise(8, "n", -5, vec![1.0, 1.0]), 1.0, 1.0);
        let wrapped = DensityFunction::marker(MarkerKind::Interpolated, noise);
        let mut cache = ChunkCache::new(4, 8);
        for pos in column_positions(16) {
            let value = cache.sample(&wrapped, pos);
            assert!(value >= wrapped.min_value() && value <= wrapped.max_value());
        }
    }

    #[test]
    fn batch_fill_matches_single_samples() {
        let positions = column_positions(3);
        for (name, function) in sample_graph(12) {
            for kind in KINDS {
                if matches!(kind, MarkerKind::Cache2D | MarkerKind::FlatCache | MarkerKind::Interpolated) {
                    continue;
                }
                let wrapped = DensityFunction::marker(kind, function.clone());
                let mut cache = ChunkCache::new(4, 8);
                let mut out = vec![0.0; positions.len()];
                cache.fill(&wrapped, &mut out, &positions);
                for (value, pos) in out.iter().zip(&positions) {
                    assert_eq!(value.to_bits(), function.sample(*pos).to_bits(), "{name} at {pos}");
                }
            }
        }
    }

    #[test]
    fn nested_markers() {
        let positions = column_positions(16);
        let base = DensityFunction::noise(bound_noise(21, "n", -4, vec![1.0]), 1.0, 1.0);
        let mut wrapped = base.clone();
        for kind in [MarkerKind::CacheOnce, MarkerKind::CacheAllInCell, MarkerKind::CacheOnce] {
            wrapped = DensityFunction::marker(kind, wrapped);
        }
        let mut cache = ChunkCache::new(4, 8);
        for pos in &positions {
            assert_eq!(cache.sample(&wrapped, *pos), base.sample(*pos));
        }
        cache.clear();
        assert_eq!(cache.sample(&wrapped, positions[0]), base.sample(positions[0]));
    }

    #[test]
    fn preliminary_surface_snaps_to_quarts() {
        let noise = DensityFunction::noise(bound_noise(5, "n", -4, vec![1.0]), 1.0, 0.0);
        let level = DensityFunction::add(DensityFunction::constant(64.0), DensityFunction::mul(DensityFunction::constant(16.0), noise.clone()));
        let mut surface = PreliminarySurface::new(level.clone());
        for x in -9..9 {
            for z in -9..9 {
                let snapped = IVec3::new(x & !3, 0, z & !3);
                assert_eq!(surface.level(x, z), level.sample(snapped).floor() as i32);
            }
        }
    }
}
