use crate::density_function::proto::{
    DensityFunctionHolder, NoiseReference, ProtoDensityFunction, SingleArgumentFunction,
    SplineHolder, TwoArgumentFunction,
};
use crate::density_function::{
    BinaryOp, DensityFunction, MarkerKind, NoiseHolder, SplineCoordinate, UnaryOp,
};
use crate::error::{Result, WorldgenError};
use crate::noise::blended_noise::BlendedNoise;
use crate::noise::simplex_noise::EndIslands;
use crate::noise::{NoiseParam, Noises};
use crate::spline::{Builder, CubicSpline};
use mcrs_random::xoroshiro::XoroshiroRandom;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Adds the default namespace to bare names.
pub fn normalize_name(name: &str) -> String {
    if name.contains(':') {
        name.to_owned()
    } else {
        format!("minecraft:{name}")
    }
}

/// Named density functions and noise parameters that references resolve against.
#[derive(Debug, Clone)]
pub struct WorldgenRegistries {
    density_functions: FxHashMap<String, DensityFunctionHolder>,
    noises: FxHashMap<String, NoiseParam>,
}

impl Default for WorldgenRegistries {
    fn default() -> Self {
        let mut registries = Self::empty();
        for noise in Noises::ALL {
            registries.register_noise(noise.name(), noise.to_noise_param());
        }
        registries
    }
}

impl WorldgenRegistries {
    pub fn empty() -> Self {
        Self {
            density_functions: FxHashMap::default(),
            noises: FxHashMap::default(),
        }
    }

    pub fn register_density_function(&mut self, name: &str, function: DensityFunctionHolder) {
        self.density_functions.insert(normalize_name(name), function);
    }

    pub fn register_noise(&mut self, name: &str, params: NoiseParam) {
        self.noises.insert(normalize_name(name), params);
    }

    pub fn density_function(&self, name: &str) -> Option<&DensityFunctionHolder> {
        self.density_functions.get(&normalize_name(name))
    }

    pub fn noise(&self, name: &str) -> Result<&NoiseParam> {
        self.noises
            .get(&normalize_name(name))
            .ok_or_else(|| WorldgenError::UnknownNoise(name.to_owned()))
    }

    pub fn density_function_count(&self) -> usize {
        self.density_functions.len()
    }
}

/// Turns data-driven definitions into unbound runtime graphs.
///
/// Named functions are built once per builder so that every reference to the same
/// name shares one node.
pub struct DensityFunctionBuilder<'a> {
    registries: &'a WorldgenRegistries,
    resolved: FxHashMap<String, Arc<DensityFunction>>,
    resolving: Vec<String>,
}

impl<'a> DensityFunctionBuilder<'a> {
    pub fn new(registries: &'a WorldgenRegistries) -> Self {
        Self {
            registries,
            resolved: FxHashMap::default(),
            resolving: Vec::new(),
        }
    }

    pub fn build(&mut self, holder: &DensityFunctionHolder) -> Result<Arc<DensityFunction>> {
        match holder {
            DensityFunctionHolder::Value(value) => Ok(DensityFunction::constant(*value)),
            DensityFunctionHolder::Reference(name) => self.build_named(name),
            DensityFunctionHolder::Owned(proto) => self.build_proto(proto),
        }
    }

    pub fn build_named(&mut self, name: &str) -> Result<Arc<DensityFunction>> {
        let name = normalize_name(name);
        if let Some(function) = self.resolved.get(&name) {
            return Ok(function.clone());
        }
        if self.resolving.contains(&name) {
            return Err(WorldgenError::CyclicReference(name));
        }
        let registries = self.registries;
        let holder = registries
            .density_function(&name)
            .ok_or_else(|| WorldgenError::UnknownDensityFunction(name.clone()))?;
        self.resolving.push(name.clone());
        let function = self.build(holder);
        self.resolving.pop();
        let function = function?;
        self.resolved.insert(name, function.clone());
        Ok(function)
    }

    fn noise(&self, reference: &NoiseReference) -> Result<NoiseHolder> {
        Ok(match reference {
            NoiseReference::Reference(name) => {
                NoiseHolder::new(normalize_name(name), self.registries.noise(name)?.clone())
            }
            NoiseReference::Owned(params) => {
                let amplitudes: Vec<String> = params.amplitudes.iter().map(f64::to_string).collect();
                let name = format!("inline:{}/{}", params.first_octave, amplitudes.join(","));
                NoiseHolder::new(name, params.clone())
            }
        })
    }

    fn single(&mut self, kind: MarkerKind, function: &SingleArgumentFunction) -> Result<Arc<DensityFunction>> {
        Ok(DensityFunction::marker(kind, self.build(&function.argument)?))
    }

    fn unary(&mut self, op: UnaryOp, function: &SingleArgumentFunction) -> Result<Arc<DensityFunction>> {
        Ok(DensityFunction::unary(op, self.build(&function.argument)?))
    }

    fn binary(&mut self, op: BinaryOp, function: &TwoArgumentFunction) -> Result<Arc<DensityFunction>> {
        let a = self.build(&function.argument1)?;
        let b = self.build(&function.argument2)?;
        Ok(DensityFunction::binary(op, a, b))
    }

    fn spline(&mut self, holder: &SplineHolder) -> Result<CubicSpline<SplineCoordinate>> {
        match holder {
            SplineHolder::Constant(value) => Ok(CubicSpline::Constant(*value as f32)),
            SplineHolder::Spline(spline) => {
                let coordinate = SplineCoordinate(self.build(&spline.coordinate)?);
                let mut builder = Builder::new(coordinate);
                for point in &spline.points {
                    let value = self.spline(&point.value)?;
                    builder = builder.add_point(point.location as f32, value, point.derivative as f32);
                }
                builder.build()
            }
        }
    }

    fn build_proto(&mut self, proto: &ProtoDensityFunction) -> Result<Arc<DensityFunction>> {
        Ok(match proto {
            ProtoDensityFunction::BlendAlpha => Arc::new(DensityFunction::BlendAlpha),
            ProtoDensityFunction::BlendOffset => Arc::new(DensityFunction::BlendOffset),
            ProtoDensityFunction::Beardifier => DensityFunction::constant(0.0),
            ProtoDensityFunction::OldBlendedNoise(params) => {
                // Reseeded per world when the router is bound.
                let noise = BlendedNoise::new(&mut XoroshiroRandom::new(0), *params)?;
                Arc::new(DensityFunction::BlendedNoise(Arc::new(noise)))
            }
            ProtoDensityFunction::Interpolated(f) => self.single(MarkerKind::Interpolated, f)?,
            ProtoDensityFunction::FlatCache(f) => self.single(MarkerKind::FlatCache, f)?,
            ProtoDensityFunction::Cache2d(f) => self.single(MarkerKind::Cache2D, f)?,
            ProtoDensityFunction::CacheOnce(f) => self.single(MarkerKind::CacheOnce, f)?,
            ProtoDensityFunction::CacheAllInCell(f) => self.single(MarkerKind::CacheAllInCell, f)?,
            ProtoDensityFunction::Noise {
                noise,
                xz_scale,
                y_scale,
            } => DensityFunction::noise(self.noise(noise)?, *xz_scale, *y_scale),
            ProtoDensityFunction::EndIslands => {
                Arc::new(DensityFunction::EndIslands(Arc::new(EndIslands::new(0))))
            }
            ProtoDensityFunction::WeirdScaledSampler {
                input,
                noise,
                rarity_value_mapper,
            } => DensityFunction::weird_scaled(
                self.build(input)?,
                self.noise(noise)?,
                *rarity_value_mapper,
            ),
            ProtoDensityFunction::ShiftedNoise {
                shift_x,
                shift_y,
                shift_z,
                xz_scale,
                y_scale,
                noise,
            } => DensityFunction::shifted_noise(
                self.build(shift_x)?,
                self.build(shift_y)?,
                self.build(shift_z)?,
                *xz_scale,
                *y_scale,
                self.noise(noise)?,
            ),
            ProtoDensityFunction::RangeChoice {
                input,
                min_inclusive,
                max_exclusive,
                when_in_range,
                when_out_of_range,
            } => DensityFunction::range_choice(
                self.build(input)?,
                *min_inclusive,
                *max_exclusive,
                self.build(when_in_range)?,
                self.build(when_out_of_range)?,
            ),
            ProtoDensityFunction::ShiftA { argument } => {
                Arc::new(DensityFunction::ShiftA(self.noise(argument)?))
            }
            ProtoDensityFunction::ShiftB { argument } => {
                Arc::new(DensityFunction::ShiftB(self.noise(argument)?))
            }
            ProtoDensityFunction::Shift { argument } => {
                Arc::new(DensityFunction::Shift(self.noise(argument)?))
            }
            ProtoDensityFunction::BlendDensity(f) => {
                Arc::new(DensityFunction::BlendDensity(self.build(&f.argument)?))
            }
            ProtoDensityFunction::Clamp { input, min, max } => {
                DensityFunction::clamp(self.build(input)?, *min, *max)?
            }
            ProtoDensityFunction::Abs(f) => self.unary(UnaryOp::Abs, f)?,
            ProtoDensityFunction::Square(f) => self.unary(UnaryOp::Square, f)?,
            ProtoDensityFunction::Cube(f) => self.unary(UnaryOp::Cube, f)?,
            ProtoDensityFunction::HalfNegative(f) => self.unary(UnaryOp::HalfNegative, f)?,
            ProtoDensityFunction::QuarterNegative(f) => self.unary(UnaryOp::QuarterNegative, f)?,
            ProtoDensityFunction::Invert(f) => self.unary(UnaryOp::Invert, f)?,
            ProtoDensityFunction::Squeeze(f) => self.unary(UnaryOp::Squeeze, f)?,
            ProtoDensityFunction::Add(f) => self.binary(BinaryOp::Add, f)?,
            ProtoDensityFunction::Mul(f) => self.binary(BinaryOp::Mul, f)?,
            ProtoDensityFunction::Min(f) => self.binary(BinaryOp::Min, f)?,
            ProtoDensityFunction::Max(f) => self.binary(BinaryOp::Max, f)?,
            ProtoDensityFunction::Spline { spline } => match self.spline(spline)? {
                CubicSpline::Constant(value) => DensityFunction::constant(value as f64),
                spline => DensityFunction::spline(spline),
            },
            ProtoDensityFunction::Constant { argument } => DensityFunction::constant(*argument),
            ProtoDensityFunction::YClampedGradient {
                from_y,
                to_y,
                from_value,
                to_value,
            } => DensityFunction::y_clamped_gradient(*from_y, *to_y, *from_value, *to_value),
            ProtoDensityFunction::FindTopSurface {
                density,
                upper_bound,
                lower_bound,
                cell_height,
            } => DensityFunction::find_top_surface(
                self.build(density)?,
                self.build(upper_bound)?,
                *lower_bound,
                *cell_height,
            )?,
        })
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}
