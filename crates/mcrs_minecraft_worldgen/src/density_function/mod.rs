use crate::error::{Result, WorldgenError};
use crate::math::clamped_map;
use crate::noise::NoiseParam;
use crate::noise::blended_noise::BlendedNoise;
use crate::noise::normal_noise::NormalNoise;
use crate::noise::simplex_noise::EndIslands;
use crate::spline::{CubicSpline, RangeFunction};
use bevy_math::IVec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

pub mod build;
pub mod cache;
pub mod proto;
pub mod router;

static NEXT_MARKER_ID: AtomicU64 = AtomicU64::new(1);

/// A named noise slot. Graphs are built unbound and get their samplers from
/// [`crate::random_state::RandomState`]; an unbound slot samples as zero.
#[derive(Clone)]
pub struct NoiseHolder {
    pub name: String,
    pub params: NoiseParam,
    sampler: Option<Arc<NormalNoise>>,
}

impl NoiseHolder {
    pub fn new(name: impl Into<String>, params: NoiseParam) -> Self {
        Self {
            name: name.into(),
            params,
            sampler: None,
        }
    }

    pub fn bind(&self, sampler: Arc<NormalNoise>) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            sampler: Some(sampler),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.sampler.is_some()
    }

    #[inline]
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        match &self.sampler {
            Some(sampler) => sampler.get(x, y, z),
            None => 0.0,
        }
    }

    pub fn max_value(&self) -> f64 {
        match &self.sampler {
            Some(sampler) => sampler.max_value(),
            None => 2.0,
        }
    }
}

impl Debug for NoiseHolder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseHolder")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RarityValueMapper {
    /// Tunnel scaling.
    #[serde(rename = "type_1")]
    Type1,
    /// Cave scaling.
    #[serde(rename = "type_2")]
    Type2,
}

impl RarityValueMapper {
    pub fn map(self, value: f64) -> f64 {
        match self {
            RarityValueMapper::Type1 => {
                if value < -0.5 {
                    0.75
                } else if value < 0.0 {
                    1.0
                } else if value < 0.5 {
                    1.5
                } else {
                    2.0
                }
            }
            RarityValueMapper::Type2 => {
                if value < -0.75 {
                    0.5
                } else if value < -0.5 {
                    0.75
                } else if value < 0.5 {
                    1.0
                } else if value < 0.75 {
                    2.0
                } else {
                    3.0
                }
            }
        }
    }

    pub fn max_rarity(self) -> f64 {
        match self {
            RarityValueMapper::Type1 => 2.0,
            RarityValueMapper::Type2 => 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Interpolated,
    FlatCache,
    Cache2D,
    CacheOnce,
    CacheAllInCell,
}

/// A caching wrapper. Outside a [`cache::ChunkCache`] it is transparent, except that a
/// flat cache always reads its input at `y = 0`.
#[derive(Clone, Debug)]
pub struct Marker {
    pub kind: MarkerKind,
    pub id: u64,
    pub input: Arc<DensityFunction>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Abs,
    Square,
    Cube,
    HalfNegative,
    QuarterNegative,
    Squeeze,
    Invert,
}

impl UnaryOp {
    #[inline]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            UnaryOp::Abs => value.abs(),
            UnaryOp::Square => value * value,
            UnaryOp::Cube => value * value * value,
            UnaryOp::HalfNegative => {
                if value > 0.0 {
                    value
                } else {
                    value * 0.5
                }
            }
            UnaryOp::QuarterNegative => {
                if value > 0.0 {
                    value
                } else {
                    value * 0.25
                }
            }
            UnaryOp::Squeeze => {
                let clamped = value.clamp(-1.0, 1.0);
                clamped / 2.0 - clamped * clamped * clamped / 24.0
            }
            UnaryOp::Invert => 1.0 / value,
        }
    }

    /// Exact image of `[min, max]`.
    fn bounds(self, min: f64, max: f64) -> (f64, f64) {
        match self {
            UnaryOp::Abs | UnaryOp::Square => {
                if min >= 0.0 {
                    (self.apply(min), self.apply(max))
                } else if max <= 0.0 {
                    (self.apply(max), self.apply(min))
                } else {
                    (0.0, self.apply(min).max(self.apply(max)))
                }
            }
            UnaryOp::Invert => {
                if min > 0.0 || max < 0.0 {
                    (1.0 / max, 1.0 / min)
                } else {
                    (f64::NEG_INFINITY, f64::INFINITY)
                }
            }
            _ => (self.apply(min), self.apply(max)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Mul,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinearOp {
    Add,
    Mul,
}

/// Spline coordinate: a density function read as `f32`.
#[derive(Clone, Debug)]
pub struct SplineCoordinate(pub Arc<DensityFunction>);

impl RangeFunction for SplineCoordinate {
    fn min_value(&self) -> f32 {
        self.0.min_value() as f32
    }

    fn max_value(&self) -> f32 {
        self.0.max_value() as f32
    }
}

/// Resolves caching wrappers while a graph is evaluated.
pub trait SampleContext {
    fn sample_marker(&mut self, marker: &Marker, pos: IVec3) -> f64;
}

/// Evaluation without any caching.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uncached;

impl SampleContext for Uncached {
    fn sample_marker(&mut self, marker: &Marker, pos: IVec3) -> f64 {
        match marker.kind {
            MarkerKind::FlatCache => marker.input.compute(IVec3::new(pos.x, 0, pos.z), self),
            _ => marker.input.compute(pos, self),
        }
    }
}

/// Rewrites a graph node by node, children first.
pub trait DensityVisitor {
    fn visit(&mut self, function: Arc<DensityFunction>) -> Result<Arc<DensityFunction>> {
        Ok(function)
    }

    fn visit_noise(&mut self, noise: &NoiseHolder) -> Result<NoiseHolder> {
        Ok(noise.clone())
    }
}

/// An immutable node of a density graph. Children are shared, so a graph is a DAG.
#[derive(Clone, Debug)]
pub enum DensityFunction {
    Constant(f64),
    BlendAlpha,
    BlendOffset,
    BlendDensity(Arc<DensityFunction>),
    Noise {
        noise: NoiseHolder,
        xz_scale: f64,
        y_scale: f64,
    },
    ShiftA(NoiseHolder),
    ShiftB(NoiseHolder),
    Shift(NoiseHolder),
    ShiftedNoise {
        shift_x: Arc<DensityFunction>,
        shift_y: Arc<DensityFunction>,
        shift_z: Arc<DensityFunction>,
        xz_scale: f64,
        y_scale: f64,
        noise: NoiseHolder,
    },
    WeirdScaledSampler {
        input: Arc<DensityFunction>,
        noise: NoiseHolder,
        rarity: RarityValueMapper,
    },
    BlendedNoise(Arc<BlendedNoise>),
    EndIslands(Arc<EndIslands>),
    Unary {
        op: UnaryOp,
        input: Arc<DensityFunction>,
        min: f64,
        max: f64,
    },
    Linear {
        op: LinearOp,
        input: Arc<DensityFunction>,
        argument: f64,
        min: f64,
        max: f64,
    },
    Binary {
        op: BinaryOp,
        a: Arc<DensityFunction>,
        b: Arc<DensityFunction>,
        min: f64,
        max: f64,
    },
    Clamp {
        input: Arc<DensityFunction>,
        min: f64,
        max: f64,
    },
    RangeChoice {
        input: Arc<DensityFunction>,
        min_inclusive: f64,
        max_exclusive: f64,
        when_in_range: Arc<DensityFunction>,
        when_out_of_range: Arc<DensityFunction>,
        min: f64,
        max: f64,
    },
    Spline(Arc<CubicSpline<SplineCoordinate>>),
    YClampedGradient {
        from_y: i32,
        to_y: i32,
        from_value: f64,
        to_value: f64,
    },
    FindTopSurface {
        density: Arc<DensityFunction>,
        upper_bound: Arc<DensityFunction>,
        lower_bound: i32,
        cell_height: i32,
    },
    Marker(Marker),
}

#[inline]
fn mul_bound(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 { 0.0 } else { a * b }
}

impl DensityFunction {
    pub fn constant(value: f64) -> Arc<Self> {
        Arc::new(DensityFunction::Constant(value))
    }

    pub fn noise(noise: NoiseHolder, xz_scale: f64, y_scale: f64) -> Arc<Self> {
        Arc::new(DensityFunction::Noise {
            noise,
            xz_scale,
            y_scale,
        })
    }

    pub fn shifted_noise(
        shift_x: Arc<Self>,
        shift_y: Arc<Self>,
        shift_z: Arc<Self>,
        xz_scale: f64,
        y_scale: f64,
        noise: NoiseHolder,
    ) -> Arc<Self> {
        Arc::new(DensityFunction::ShiftedNoise {
            shift_x,
            shift_y,
            shift_z,
            xz_scale,
            y_scale,
            noise,
        })
    }

    pub fn weird_scaled(input: Arc<Self>, noise: NoiseHolder, rarity: RarityValueMapper) -> Arc<Self> {
        Arc::new(DensityFunction::WeirdScaledSampler {
            input,
            noise,
            rarity,
        })
    }

    pub fn unary(op: UnaryOp, input: Arc<Self>) -> Arc<Self> {
        if let Some(value) = input.as_constant() {
            return Self::constant(op.apply(value));
        }
        let (min, max) = op.bounds(input.min_value(), input.max_value());
        Arc::new(DensityFunction::Unary {
            op,
            input,
            min,
            max,
        })
    }

    pub fn add(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Add, a, b)
    }

    pub fn mul(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Mul, a, b)
    }

    pub fn min(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Min, a, b)
    }

    pub fn max(a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Max, a, b)
    }

    /// Builds a two-argument node, folding constants into a [`DensityFunction::Linear`].
    pub fn binary(op: BinaryOp, a: Arc<Self>, b: Arc<Self>) -> Arc<Self> {
        let (a_min, a_max) = (a.min_value(), a.max_value());
        let (b_min, b_max) = (b.min_value(), b.max_value());
        match op {
            BinaryOp::Add | BinaryOp::Mul => {
                let linear = if op == BinaryOp::Add {
                    LinearOp::Add
                } else {
                    LinearOp::Mul
                };
                match (a.as_constant(), b.as_constant()) {
                    (Some(x), Some(y)) => {
                        return Self::constant(if op == BinaryOp::Add { x + y } else { x * y });
                    }
                    (Some(x), None) => return Self::linear(linear, b, x),
                    (None, Some(y)) => return Self::linear(linear, a, y),
                    (None, None) => {}
                }
            }
            BinaryOp::Min | BinaryOp::Max => {
                if a_min >= b_max || b_min >= a_max {
                    warn!(
                        "creating {:?} between non-overlapping inputs [{}, {}] and [{}, {}]",
                        op, a_min, a_max, b_min, b_max
                    );
                }
            }
        }
        let (min, max) = match op {
            BinaryOp::Add => (a_min + b_min, a_max + b_max),
            BinaryOp::Mul => {
                let corners = [
                    mul_bound(a_min, b_min),
                    mul_bound(a_min, b_max),
                    mul_bound(a_max, b_min),
                    mul_bound(a_max, b_max),
                ];
                (
                    corners.iter().copied().fold(f64::INFINITY, f64::min),
                    corners.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                )
            }
            BinaryOp::Min => (a_min.min(b_min), a_max.min(b_max)),
            BinaryOp::Max => (a_min.max(b_min), a_max.max(b_max)),
        };
        Arc::new(DensityFunction::Binary { op, a, b, min, max })
    }

    pub fn linear(op: LinearOp, input: Arc<Self>, argument: f64) -> Arc<Self> {
        let (input_min, input_max) = (input.min_value(), input.max_value());
        let (min, max) = match op {
            LinearOp::Add => (input_min + argument, input_max + argument),
            LinearOp::Mul if argument >= 0.0 => (
                mul_bound(input_min, argument),
                mul_bound(input_max, argument),
            ),
            LinearOp::Mul => (
                mul_bound(input_max, argument),
                mul_bound(input_min, argument),
            ),
        };
        Arc::new(DensityFunction::Linear {
            op,
            input,
            argument,
            min,
            max,
        })
    }

    pub fn clamp(input: Arc<Self>, min: f64, max: f64) -> Result<Arc<Self>> {
        if !(min <= max) {
            return Err(WorldgenError::InvalidRange {
                min: min as f32,
                max: max as f32,
            });
        }
        Ok(Arc::new(DensityFunction::Clamp { input, min, max }))
    }

    pub fn range_choice(
        input: Arc<Self>,
        min_inclusive: f64,
        max_exclusive: f64,
        when_in_range: Arc<Self>,
        when_out_of_range: Arc<Self>,
    ) -> Arc<Self> {
        let min = when_in_range.min_value().min(when_out_of_range.min_value());
        let max = when_in_range.max_value().max(when_out_of_range.max_value());
        Arc::new(DensityFunction::RangeChoice {
            input,
            min_inclusive,
            max_exclusive,
            when_in_range,
            when_out_of_range,
            min,
            max,
        })
    }

    pub fn spline(spline: CubicSpline<SplineCoordinate>) -> Arc<Self> {
        Arc::new(DensityFunction::Spline(Arc::new(spline)))
    }

    pub fn y_clamped_gradient(from_y: i32, to_y: i32, from_value: f64, to_value: f64) -> Arc<Self> {
        Arc::new(DensityFunction::YClampedGradient {
            from_y,
            to_y,
            from_value,
            to_value,
        })
    }

    pub fn find_top_surface(
        density: Arc<Self>,
        upper_bound: Arc<Self>,
        lower_bound: i32,
        cell_height: i32,
    ) -> Result<Arc<Self>> {
        if cell_height <= 0 {
            return Err(WorldgenError::InvalidRange {
                min: 1.0,
                max: cell_height as f32,
            });
        }
        Ok(Arc::new(DensityFunction::FindTopSurface {
            density,
            upper_bound,
            lower_bound,
            cell_height,
        }))
    }

    /// Wraps `input` in a caching marker with a fresh identity.
    pub fn marker(kind: MarkerKind, input: Arc<Self>) -> Arc<Self> {
        Arc::new(DensityFunction::Marker(Marker {
            kind,
            id: NEXT_MARKER_ID.fetch_add(1, Ordering::Relaxed),
            input,
        }))
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            DensityFunction::Constant(value) => Some(*value),
            _ => None,
        }
    }

    pub fn min_value(&self) -> f64 {
        match self {
            DensityFunction::Constant(value) => *value,
            DensityFunction::BlendAlpha => 1.0,
            DensityFunction::BlendOffset => 0.0,
            DensityFunction::BlendDensity(input) => input.min_value(),
            DensityFunction::Noise { noise, .. } | DensityFunction::ShiftedNoise { noise, .. } => {
                -noise.max_value()
            }
            DensityFunction::ShiftA(noise)
            | DensityFunction::ShiftB(noise)
            | DensityFunction::Shift(noise) => -noise.max_value() * 4.0,
            DensityFunction::WeirdScaledSampler { .. } => 0.0,
            DensityFunction::BlendedNoise(noise) => noise.min_value(),
            DensityFunction::EndIslands(_) => EndIslands::MIN_VALUE,
            DensityFunction::Unary { min, .. }
            | DensityFunction::Linear { min, .. }
            | DensityFunction::Binary { min, .. }
            | DensityFunction::Clamp { min, .. }
            | DensityFunction::RangeChoice { min, .. } => *min,
            DensityFunction::Spline(spline) => spline.min_value() as f64,
            DensityFunction::YClampedGradient {
                from_value,
                to_value,
                ..
            } => from_value.min(*to_value),
            DensityFunction::FindTopSurface { lower_bound, .. } => *lower_bound as f64,
            DensityFunction::Marker(marker) => marker.input.min_value(),
        }
    }

    pub fn max_value(&self) -> f64 {
        match self {
            DensityFunction::Constant(value) => *value,
            DensityFunction::BlendAlpha => 1.0,
            DensityFunction::BlendOffset => 0.0,
            DensityFunction::BlendDensity(input) => input.max_value(),
            DensityFunction::Noise { noise, .. } | DensityFunction::ShiftedNoise { noise, .. } => {
                noise.max_value()
            }
            DensityFunction::ShiftA(noise)
            | DensityFunction::ShiftB(noise)
            | DensityFunction::Shift(noise) => noise.max_value() * 4.0,
            DensityFunction::WeirdScaledSampler { noise, rarity, .. } => {
                rarity.max_rarity() * noise.max_value()
            }
            DensityFunction::BlendedNoise(noise) => noise.max_value(),
            DensityFunction::EndIslands(_) => EndIslands::MAX_VALUE,
            DensityFunction::Unary { max, .. }
            | DensityFunction::Linear { max, .. }
            | DensityFunction::Binary { max, .. }
            | DensityFunction::Clamp { max, .. }
            | DensityFunction::RangeChoice { max, .. } => *max,
            DensityFunction::Spline(spline) => spline.max_value() as f64,
            DensityFunction::YClampedGradient {
                from_value,
                to_value,
                ..
            } => from_value.max(*to_value),
            DensityFunction::FindTopSurface {
                upper_bound,
                lower_bound,
                ..
            } => (*lower_bound as f64).max(upper_bound.max_value()),
            DensityFunction::Marker(marker) => marker.input.max_value(),
        }
    }

    /// Uncached evaluation at a block position.
    pub fn sample(&self, pos: IVec3) -> f64 {
        self.compute(pos, &mut Uncached)
    }

    pub fn compute<C>(&self, pos: IVec3, ctx: &mut C) -> f64
    where
        C: SampleContext + ?Sized,
    {
        let (x, y, z) = (pos.x as f64, pos.y as f64, pos.z as f64);
        match self {
            DensityFunction::Constant(value) => *value,
            DensityFunction::BlendAlpha => 1.0,
            DensityFunction::BlendOffset => 0.0,
            DensityFunction::BlendDensity(input) => input.compute(pos, ctx),
            DensityFunction::Noise {
                noise,
                xz_scale,
                y_scale,
            } => noise.sample(x * xz_scale, y * y_scale, z * xz_scale),
            DensityFunction::ShiftA(noise) => noise.sample(x * 0.25, 0.0, z * 0.25) * 4.0,
            DensityFunction::ShiftB(noise) => noise.sample(z * 0.25, x * 0.25, 0.0) * 4.0,
            DensityFunction::Shift(noise) => noise.sample(x * 0.25, y * 0.25, z * 0.25) * 4.0,
            DensityFunction::ShiftedNoise {
                shift_x,
                shift_y,
                shift_z,
                xz_scale,
                y_scale,
                noise,
            } => {
                let sx = shift_x.compute(pos, ctx);
                let sy = shift_y.compute(pos, ctx);
                let sz = shift_z.compute(pos, ctx);
                noise.sample(x * xz_scale + sx, y * y_scale + sy, z * xz_scale + sz)
            }
            DensityFunction::WeirdScaledSampler {
                input,
                noise,
                rarity,
            } => {
                let scale = rarity.map(input.compute(pos, ctx));
                scale * noise.sample(x / scale, y / scale, z / scale).abs()
            }
            DensityFunction::BlendedNoise(noise) => noise.compute(pos.x, pos.y, pos.z),
            DensityFunction::EndIslands(islands) => islands.sample(pos.x, pos.z),
            DensityFunction::Unary { op, input, .. } => op.apply(input.compute(pos, ctx)),
            DensityFunction::Linear {
                op, input, argument, ..
            } => {
                let value = input.compute(pos, ctx);
                match op {
                    LinearOp::Add => value + argument,
                    LinearOp::Mul => value * argument,
                }
            }
            DensityFunction::Binary { op, a, b, .. } => {
                let value = a.compute(pos, ctx);
                match op {
                    BinaryOp::Add => value + b.compute(pos, ctx),
                    BinaryOp::Mul => {
                        if value == 0.0 {
                            0.0
                        } else {
                            value * b.compute(pos, ctx)
                        }
                    }
                    BinaryOp::Min => {
                        if value < b.min_value() {
                            value
                        } else {
                            value.min(b.compute(pos, ctx))
                        }
                    }
                    BinaryOp::Max => {
                        if value > b.max_value() {
                            value
                        } else {
                            value.max(b.compute(pos, ctx))
                        }
                    }
                }
            }
            DensityFunction::Clamp { input, min, max } => input.compute(pos, ctx).clamp(*min, *max),
            DensityFunction::RangeChoice {
                input,
                min_inclusive,
                max_exclusive,
                when_in_range,
                when_out_of_range,
                ..
            } => {
                let value = input.compute(pos, ctx);
                if value >= *min_inclusive && value < *max_exclusive {
                    when_in_range.compute(pos, ctx)
                } else {
                    when_out_of_range.compute(pos, ctx)
                }
            }
            DensityFunction::Spline(spline) => {
                spline.apply(&mut |coordinate: &SplineCoordinate| {
                    coordinate.0.compute(pos, ctx) as f32
                }) as f64
            }
            DensityFunction::YClampedGradient {
                from_y,
                to_y,
                from_value,
                to_value,
            } => clamped_map(y, *from_y as f64, *to_y as f64, *from_value, *to_value),
            DensityFunction::FindTopSurface {
                density,
                upper_bound,
                lower_bound,
                cell_height,
            } => {
                let top = (upper_bound.compute(pos, ctx) / *cell_height as f64).floor() as i32
                    * cell_height;
                if top <= *lower_bound {
                    return *lower_bound as f64;
                }
                let mut y = top;
                while y >= *lower_bound {
                    if density.sample(IVec3::new(pos.x, y, pos.z)) > 0.0 {
                        return y as f64;
                    }
                    y -= cell_height;
                }
                *lower_bound as f64
            }
            DensityFunction::Marker(marker) => ctx.sample_marker(marker, pos),
        }
    }

    /// Uncached batch evaluation; `out[i]` receives the value at `positions[i]`.
    pub fn fill(&self, out: &mut [f64], positions: &[IVec3]) {
        self.fill_in(out, positions, &mut Uncached)
    }

    /// Batch evaluation. Binary nodes evaluate their first argument for the whole batch and
    /// only consult the second where the short-circuit rules require it.
    pub fn fill_in<C>(&self, out: &mut [f64], positions: &[IVec3], ctx: &mut C)
    where
        C: SampleContext + ?Sized,
    {
        debug_assert_eq!(out.len(), positions.len());
        match self {
            DensityFunction::Constant(value) => out.fill(*value),
            DensityFunction::Unary { op, input, .. } => {
                input.fill_in(out, positions, ctx);
                out.iter_mut().for_each(|v| *v = op.apply(*v));
            }
            DensityFunction::Linear {
                op, input, argument, ..
            } => {
                input.fill_in(out, positions, ctx);
                match op {
                    LinearOp::Add => out.iter_mut().for_each(|v| *v += argument),
                    LinearOp::Mul => out.iter_mut().for_each(|v| *v *= argument),
                }
            }
            DensityFunction::Clamp { input, min, max } => {
                input.fill_in(out, positions, ctx);
                out.iter_mut().for_each(|v| *v = v.clamp(*min, *max));
            }
            DensityFunction::Binary { op, a, b, .. } => {
                a.fill_in(out, positions, ctx);
                match op {
                    BinaryOp::Add => {
                        let mut other = vec![0.0; out.len()];
                        b.fill_in(&mut other, positions, ctx);
                        out.iter_mut().zip(other).for_each(|(v, o)| *v += o);
                    }
                    BinaryOp::Mul => {
                        for (v, pos) in out.iter_mut().zip(positions) {
                            *v = if *v == 0.0 { 0.0 } else { *v * b.compute(*pos, ctx) };
                        }
                    }
                    BinaryOp::Min => {
                        let b_min = b.min_value();
                        for (v, pos) in out.iter_mut().zip(positions) {
                            if !(*v < b_min) {
                                *v = v.min(b.compute(*pos, ctx));
                            }
                        }
                    }
                    BinaryOp::Max => {
                        let b_max = b.max_value();
                        for (v, pos) in out.iter_mut().zip(positions) {
                            if !(*v > b_max) {
                                *v = v.max(b.compute(*pos, ctx));
                            }
                        }
                    }
                }
            }
            _ => {
                for (v, pos) in out.iter_mut().zip(positions) {
                    *v = self.compute(*pos, ctx);
                }
            }
        }
    }

    /// Rebuilds the graph bottom-up through `visitor`. Shared nodes are rebuilt once, so the
    /// result keeps the sharing (and the marker identities) of the input.
    pub fn transform<V>(self: &Arc<Self>, visitor: &mut V) -> Result<Arc<Self>>
    where
        V: DensityVisitor + ?Sized,
    {
        let mut memo = FxHashMap::default();
        Self::transform_memo(self, visitor, &mut memo)
    }

    pub(crate) fn transform_memo<V>(
        this: &Arc<Self>,
        visitor: &mut V,
        memo: &mut FxHashMap<usize, Arc<Self>>,
    ) -> Result<Arc<Self>>
    where
        V: DensityVisitor + ?Sized,
    {
        let key = Arc::as_ptr(this) as usize;
        if let Some(done) = memo.get(&key) {
            return Ok(done.clone());
        }
        let rebuilt = match this.as_ref() {
            DensityFunction::Constant(_)
            | DensityFunction::BlendAlpha
            | DensityFunction::BlendOffset
            | DensityFunction::BlendedNoise(_)
            | DensityFunction::EndIslands(_)
            | DensityFunction::YClampedGradient { .. } => this.clone(),
            DensityFunction::BlendDensity(input) => Arc::new(DensityFunction::BlendDensity(
                Self::transform_memo(input, visitor, memo)?,
            )),
            DensityFunction::Noise {
                noise,
                xz_scale,
                y_scale,
            } => Self::noise(visitor.visit_noise(noise)?, *xz_scale, *y_scale),
            DensityFunction::ShiftA(noise) => {
                Arc::new(DensityFunction::ShiftA(visitor.visit_noise(noise)?))
            }
            DensityFunction::ShiftB(noise) => {
                Arc::new(DensityFunction::ShiftB(visitor.visit_noise(noise)?))
            }
            DensityFunction::Shift(noise) => {
                Arc::new(DensityFunction::Shift(visitor.visit_noise(noise)?))
            }
            DensityFunction::ShiftedNoise {
                shift_x,
                shift_y,
                shift_z,
                xz_scale,
                y_scale,
                noise,
            } => Self::shifted_noise(
                Self::transform_memo(shift_x, visitor, memo)?,
                Self::transform_memo(shift_y, visitor, memo)?,
                Self::transform_memo(shift_z, visitor, memo)?,
                *xz_scale,
                *y_scale,
                visitor.visit_noise(noise)?,
            ),
            DensityFunction::WeirdScaledSampler {
                input,
                noise,
                rarity,
            } => Self::weird_scaled(
                Self::transform_memo(input, visitor, memo)?,
                visitor.visit_noise(noise)?,
                *rarity,
            ),
            DensityFunction::Unary { op, input, .. } => {
                Self::unary(*op, Self::transform_memo(input, visitor, memo)?)
            }
            DensityFunction::Linear {
                op, input, argument, ..
            } => Self::linear(*op, Self::transform_memo(input, visitor, memo)?, *argument),
            DensityFunction::Binary { op, a, b, .. } => Self::binary(
                *op,
                Self::transform_memo(a, visitor, memo)?,
                Self::transform_memo(b, visitor, memo)?,
            ),
            DensityFunction::Clamp { input, min, max } => {
                Self::clamp(Self::transform_memo(input, visitor, memo)?, *min, *max)?
            }
            DensityFunction::RangeChoice {
                input,
                min_inclusive,
                max_exclusive,
                when_in_range,
                when_out_of_range,
                ..
            } => Self::range_choice(
                Self::transform_memo(input, visitor, memo)?,
                *min_inclusive,
                *max_exclusive,
                Self::transform_memo(when_in_range, visitor, memo)?,
                Self::transform_memo(when_out_of_range, visitor, memo)?,
            ),
            DensityFunction::Spline(spline) => Self::spline(spline.map_all(
                &mut |coordinate: &SplineCoordinate| {
                    Ok(SplineCoordinate(Self::transform_memo(
                        &coordinate.0,
                        visitor,
                        memo,
                    )?))
                },
            )?),
            DensityFunction::FindTopSurface {
                density,
                upper_bound,
                lower_bound,
                cell_height,
            } => Self::find_top_surface(
                Self::transform_memo(density, visitor, memo)?,
                Self::transform_memo(upper_bound, visitor, memo)?,
                *lower_bound,
                *cell_height,
            )?,
            DensityFunction::Marker(marker) => {
                Self::marker(marker.kind, Self::transform_memo(&marker.input, visitor, memo)?)
            }
        };
        let result = visitor.visit(rebuilt)?;
        memo.insert(key, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use crate::density_function::{
        BinaryOp, DensityFunction, DensityVisitor, MarkerKind, NoiseHolder, RarityValueMapper,
        SplineCoordinate, UnaryOp,
    };
    use crate::error::Result;
    use crate::noise::NoiseParam;
    use crate::noise::blended_noise::{BlendedNoise, BlendedNoiseParams};
    use crate::noise::normal_noise::NormalNoise;
    use crate::noise::simplex_noise::EndIslands;
    use crate::spline::Builder;
    use bevy_math::IVec3;
    use mcrs_random::Random;
    use mcrs_random::xoroshiro::XoroshiroRandom;
    use std::sync::Arc;

    pub(crate) fn bound_noise(seed: u64, name: &str, first_octave: i32, amplitudes: Vec<f64>) -> NoiseHolder {
        let params = NoiseParam::new(first_octave, amplitudes);
        let sampler = NormalNoise::new(&mut XoroshiroRandom::new(seed), &params);
        NoiseHolder::new(name, params).bind(Arc::new(sampler))
    }

    pub(crate) fn random_positions(seed: u64, count: usize, spread: i32) -> Vec<IVec3> {
        let mut random = XoroshiroRandom::new(seed);
        (0..count)
            .map(|_| {
                IVec3::new(
                    random.next_i32_between_inclusive(-spread, spread),
                    random.next_i32_between_inclusive(-64, 320),
                    random.next_i32_between_inclusive(-spread, spread),
                )
            })
            .collect()
    }

    /// A graph touching most node kinds.
    pub(crate) fn sample_graph(seed: u64) -> Vec<(&'static str, Arc<DensityFunction>)> {
        let n = DensityFunction::noise(bound_noise(seed, "n", -6, vec![1.0, 1.0, 0.5]), 1.0, 0.5);
        let m = DensityFunction::noise(bound_noise(seed + 1, "m", -4, vec![1.0, 0.0, 1.0]), 0.5, 1.0);
        let shift = bound_noise(seed + 2, "shift", -3, vec![1.0, 1.0, 1.0, 0.0]);
        let shift_x = Arc::new(DensityFunction::ShiftA(shift.clone()));
        let shift_z = Arc::new(DensityFunction::ShiftB(shift.clone()));
        let shifted = DensityFunction::shifted_noise(
            shift_x.clone(),
            DensityFunction::constant(0.0),
            shift_z,
            0.25,
            0.0,
            bound_noise(seed + 3, "shifted", -9, vec![1.0, 1.0, 2.0]),
        );
        let weird = DensityFunction::weird_scaled(
            m.clone(),
            bound_noise(seed + 4, "weird", -7, vec![1.0]),
            RarityValueMapper::Type2,
        );
        let blended = Arc::new(DensityFunction::BlendedNoise(Arc::new(
            BlendedNoise::new(&mut XoroshiroRandom::new(seed), BlendedNoiseParams::default()).unwrap(),
        )));
        let islands = Arc::new(DensityFunction::EndIslands(Arc::new(EndIslands::new(seed))));
        let gradient = DensityFunction::y_clamped_gradient(-64, 320, 1.5, -1.5);
        let spline = DensityFunction::spline(
            Builder::new(SplineCoordinate(n.clone()))
                .add_point(-0.5, -0.2, 0.4)
                .add_point(0.0, 0.3, 1.2)
                .add_point(0.4, 0.1, -0.7)
                .build()
                .unwrap(),
        );
        let inverted = DensityFunction::unary(
            UnaryOp::Invert,
            DensityFunction::add(DensityFunction::unary(UnaryOp::Abs, m.clone()), DensityFunction::constant(0.5)),
        );
        vec![
            ("noise", n.clone()),
            ("shift", Arc::new(DensityFunction::Shift(shift))),
            ("shifted", shifted.clone()),
            ("weird", weird),
            ("blended", blended),
            ("islands", islands),
            ("gradient", gradient.clone()),
            ("spline", spline.clone()),
            ("inverted", inverted),
            ("square", DensityFunction::unary(UnaryOp::Square, DensityFunction::add(n.clone(), DensityFunction::constant(0.3)))),
            ("cube", DensityFunction::unary(UnaryOp::Cube, m.clone())),
            ("squeeze", DensityFunction::unary(UnaryOp::Squeeze, DensityFunction::mul(n.clone(), DensityFunction::constant(2.0)))),
            ("half_negative", DensityFunction::unary(UnaryOp::HalfNegative, shifted.clone())),
            ("quarter_negative", DensityFunction::unary(UnaryOp::QuarterNegative, gradient.clone())),
            ("mul", DensityFunction::mul(n.clone(), m.clone())),
            ("min", DensityFunction::min(spline.clone(), gradient.clone())),
            ("max", DensityFunction::max(m.clone(), shifted.clone())),
            ("clamp", DensityFunction::clamp(DensityFunction::add(n.clone(), m.clone()), -0.4, 0.4).unwrap()),
            (
                "range_choice",
                DensityFunction::range_choice(m.clone(), -0.2, 0.2, n.clone(), gradient.clone()),
            ),
            (
                "top_surface",
                DensityFunction::find_top_surface(
                    DensityFunction::add(gradient.clone(), n.clone()),
                    DensityFunction::constant(128.0),
                    -64,
                    8,
                )
                .unwrap(),
            ),
            ("cached", DensityFunction::marker(MarkerKind::CacheOnce, DensityFunction::add(n, shift_x))),
        ]
    }

    #[test]
    fn constants_fold() {
        let folded = DensityFunction::add(DensityFunction::constant(1.5), DensityFunction::constant(2.0));
        assert_eq!(folded.as_constant(), Some(3.5));
        let linear = DensityFunction::mul(
            DensityFunction::y_clamped_gradient(0, 10, 0.0, 1.0),
            DensityFunction::constant(-2.0),
        );
        assert!(matches!(linear.as_ref(), DensityFunction::Linear { .. }));
        assert_eq!(linear.min_value(), -2.0);
        assert_eq!(linear.max_value(), 0.0);
        assert_eq!(linear.sample(IVec3::new(0, 5, 0)), -1.0);
    }

    #[test]
    fn bounds_are_exact_for_even_ops() {
        let positive = DensityFunction::y_clamped_gradient(0, 10, 0.5, 2.0);
        let square = DensityFunction::unary(UnaryOp::Square, positive.clone());
        assert_eq!((square.min_value(), square.max_value()), (0.25, 4.0));
        let straddling = DensityFunction::y_clamped_gradient(0, 10, -3.0, 2.0);
        let abs = DensityFunction::unary(UnaryOp::Abs, straddling.clone());
        assert_eq!((abs.min_value(), abs.max_value()), (0.0, 3.0));
        let invert = DensityFunction::unary(UnaryOp::Invert, straddling);
        assert_eq!(invert.max_value(), f64::INFINITY);
        let invert = DensityFunction::unary(UnaryOp::Invert, positive);
        assert_eq!((invert.min_value(), invert.max_value()), (0.5, 2.0));
    }

    #[test]
    fn clamp_rejects_inverted_range() {
        assert!(DensityFunction::clamp(DensityFunction::constant(0.0), 1.0, -1.0).is_err());
    }

    #[test]
    fn min_skips_second_argument() {
        // An unbound noise reports [-2, 2]; anything below -2 never needs it.
        let unbound = DensityFunction::noise(NoiseHolder::new("unbound", NoiseParam::default()), 1.0, 1.0);
        let low = DensityFunction::y_clamped_gradient(0, 1, -5.0, -5.0);
        let min = DensityFunction::binary(BinaryOp::Min, low, unbound);
        assert_eq!(min.sample(IVec3::ZERO), -5.0);
        assert_eq!((min.min_value(), min.max_value()), (-5.0, -5.0));
    }

    #[test]
    fn deterministic() {
        let first = sample_graph(17);
        let second = sample_graph(17);
        for pos in random_positions(3, 200, 5000) {
            for ((name, a), (_, b)) in first.iter().zip(&second) {
                assert_eq!(a.sample(pos).to_bits(), b.sample(pos).to_bits(), "{name} at {pos}");
            }
        }
    }

    #[test]
    fn bounds_are_sound() {
        let graph = sample_graph(5);
        for pos in random_positions(11, 10_000, 30_000) {
            for (name, function) in &graph {
                let value = function.sample(pos);
                // Splines evaluate in f32, allow for its rounding.
                let slack = if *name == "spline" || *name == "min" { 1.0e-6 } else { 0.0 };
                assert!(
                    value >= function.min_value() - slack && value <= function.max_value() + slack,
                    "{name} at {pos}: {value} not in [{}, {}]",
                    function.min_value(),
                    function.max_value()
                );
            }
        }
    }

    #[test]
    fn fill_matches_sample() {
        let positions = random_positions(23, 256, 2000);
        for (name, function) in sample_graph(9) {
            let mut out = vec![0.0; positions.len()];
            function.fill(&mut out, &positions);
            for (value, pos) in out.iter().zip(&positions) {
                assert_eq!(value.to_bits(), function.sample(*pos).to_bits(), "{name} at {pos}");
            }
        }
    }

    #[test]
    fn transform_keeps_sharing() {
        struct Identity;
        impl DensityVisitor for Identity {}

        let shared = DensityFunction::marker(
            MarkerKind::CacheOnce,
            DensityFunction::y_clamped_gradient(0, 16, 0.0, 1.0),
        );
        let graph = DensityFunction::add(shared.clone(), DensityFunction::unary(UnaryOp::Abs, shared));
        let rebuilt = graph.transform(&mut Identity).unwrap();
        let DensityFunction::Binary { a, b, .. } = rebuilt.as_ref() else {
            panic!("expected a binary node");
        };
        let DensityFunction::Unary { input, .. } = b.as_ref() else {
            panic!("expected a unary node");
        };
        assert!(Arc::ptr_eq(a, input));
    }

    #[test]
    fn transform_binds_noise() {
        struct Bind;
        impl DensityVisitor for Bind {
            fn visit_noise(&mut self, noise: &NoiseHolder) -> Result<NoiseHolder> {
                let sampler = NormalNoise::new(&mut XoroshiroRandom::new(1), &noise.params);
                Ok(noise.bind(Arc::new(sampler)))
            }
        }
        let unbound = DensityFunction::noise(NoiseHolder::new("n", NoiseParam::new(-4, vec![1.0])), 1.0, 1.0);
        assert_eq!(unbound.sample(IVec3::new(3, 4, 5)), 0.0);
        let bound = unbound.transform(&mut Bind).unwrap();
        assert_ne!(bound.sample(IVec3::new(3, 4, 5)), 0.0);
        let sampler = NormalNoise::new(&mut XoroshiroRandom::new(1), &NoiseParam::new(-4, vec![1.0]));
        assert_eq!(bound.max_value(), sampler.max_value());
        assert_eq!(bound.min_value(), -sampler.max_value());
        assert!((bound.max_value() - 10.0 / 3.0).abs() < 1e-9);
    }
}
