use crate::error::{Result, WorldgenError};
use bevy_math::FloatExt;

/// Anything a spline can use as its coordinate: it only has to report its value range.
pub trait RangeFunction {
    fn min_value(&self) -> f32;

    fn max_value(&self) -> f32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplinePoint<F: RangeFunction> {
    pub location: f32,
    pub value: CubicSpline<F>,
    pub derivative: f32,
}

impl<F: RangeFunction> SplinePoint<F> {
    /// Straight-line continuation of the curve past this point.
    fn extend(&self, point: f32, value: f32) -> f32 {
        if self.derivative == 0.0 {
            value
        } else {
            value + self.derivative * (point - self.location)
        }
    }
}

/// A piecewise cubic Hermite spline whose point values may themselves be splines.
///
/// Evaluation is single precision throughout so results match the reference terrain
/// bit for bit; callers widen the result afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum CubicSpline<F: RangeFunction> {
    Constant(f32),
    MultiPoint {
        coordinate: F,
        points: Vec<SplinePoint<F>>,
        min_value: f32,
        max_value: f32,
    },
}

impl<F: RangeFunction> CubicSpline<F> {
    pub fn multipoint(coordinate: F, points: Vec<SplinePoint<F>>) -> Result<Self> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(WorldgenError::InvalidSpline(
                "a multipoint spline needs at least one point".to_owned(),
            ));
        };
        if let Some(pair) = points.windows(2).find(|pair| pair[0].location > pair[1].location) {
            return Err(WorldgenError::InvalidSpline(format!(
                "locations out of order: {} before {}",
                pair[0].location, pair[1].location
            )));
        }

        let mut bounds = (f32::INFINITY, f32::NEG_INFINITY);
        let mut include = |lo: f32, hi: f32| {
            bounds.0 = bounds.0.min(lo);
            bounds.1 = bounds.1.max(hi);
        };
        let below = coordinate.min_value();
        if below < first.location {
            let a = first.extend(below, first.value.min_value());
            let b = first.extend(below, first.value.max_value());
            include(a.min(b), a.max(b));
        }
        let above = coordinate.max_value();
        if above > last.location {
            let a = last.extend(above, last.value.min_value());
            let b = last.extend(above, last.value.max_value());
            include(a.min(b), a.max(b));
        }
        for point in &points {
            include(point.value.min_value(), point.value.max_value());
        }
        for pair in points.windows(2) {
            if let Some((lo, hi)) = segment_bounds(&pair[0], &pair[1]) {
                include(lo, hi);
            }
        }

        let (min_value, max_value) = bounds;
        Ok(CubicSpline::MultiPoint {
            coordinate,
            points,
            min_value,
            max_value,
        })
    }

    /// Rebuilds the spline with every coordinate passed through `visitor`, recomputing bounds.
    pub fn map_all<G, V>(&self, visitor: &mut V) -> Result<CubicSpline<G>>
    where
        G: RangeFunction,
        V: FnMut(&F) -> Result<G>,
    {
        let CubicSpline::MultiPoint {
            coordinate, points, ..
        } = self
        else {
            return Ok(CubicSpline::Constant(self.min_value()));
        };
        let coordinate = visitor(coordinate)?;
        let points = points
            .iter()
            .map(|point| {
                Ok(SplinePoint {
                    location: point.location,
                    value: point.value.map_all(visitor)?,
                    derivative: point.derivative,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        CubicSpline::multipoint(coordinate, points)
    }

    /// Visits every coordinate, depth first.
    pub fn for_each_coordinate<V>(&self, visitor: &mut V)
    where
        V: FnMut(&F),
    {
        if let CubicSpline::MultiPoint {
            coordinate, points, ..
        } = self
        {
            visitor(coordinate);
            for point in points {
                point.value.for_each_coordinate(visitor);
            }
        }
    }

    /// Evaluates the spline; `coordinate` resolves each coordinate function to its value.
    pub fn apply<E>(&self, coordinate: &mut E) -> f32
    where
        E: FnMut(&F) -> f32,
    {
        let CubicSpline::MultiPoint {
            coordinate: function,
            points,
            ..
        } = self
        else {
            return self.min_value();
        };
        let x = coordinate(function);
        let upper = points.partition_point(|point| x >= point.location);
        if upper == 0 {
            let first = &points[0];
            return first.extend(x, first.value.apply(coordinate));
        }
        if upper == points.len() {
            let last = &points[upper - 1];
            return last.extend(x, last.value.apply(coordinate));
        }

        let (left, right) = (&points[upper - 1], &points[upper]);
        let width = right.location - left.location;
        let t = (x - left.location) / width;
        let v0 = left.value.apply(coordinate);
        let v1 = right.value.apply(coordinate);
        let rise = v1 - v0;
        let start_bend = left.derivative * width - rise;
        let end_bend = rise - right.derivative * width;
        v0.lerp(v1, t) + t * (1.0 - t) * start_bend.lerp(end_bend, t)
    }
}

/// Conservative range of the Hermite curve between two neighbouring points. Flat
/// segments never leave the hull of their end values, so they add nothing.
fn segment_bounds<F: RangeFunction>(left: &SplinePoint<F>, right: &SplinePoint<F>) -> Option<(f32, f32)> {
    if left.derivative == 0.0 && right.derivative == 0.0 {
        return None;
    }
    let width = right.location - left.location;
    let (left_lo, left_hi) = (left.value.min_value(), left.value.max_value());
    let (right_lo, right_hi) = (right.value.min_value(), right.value.max_value());
    let left_slope = left.derivative * width;
    let right_slope = right.derivative * width;

    let min_delta = (left_slope - right_hi + left_lo).min(-right_slope + right_lo - left_hi);
    let max_delta = (left_slope - right_lo + left_hi).max(-right_slope + right_hi - left_lo);
    Some((
        left_lo.min(right_lo) + 0.25 * min_delta,
        left_hi.max(right_hi) + 0.25 * max_delta,
    ))
}

impl<F: RangeFunction> RangeFunction for CubicSpline<F> {
    fn min_value(&self) -> f32 {
        match self {
            CubicSpline::Constant(v) => *v,
            CubicSpline::MultiPoint { min_value, .. } => *min_value,
        }
    }

    fn max_value(&self) -> f32 {
        match self {
            CubicSpline::Constant(v) => *v,
            CubicSpline::MultiPoint { max_value, .. } => *max_value,
        }
    }
}

impl<F: RangeFunction> From<f32> for CubicSpline<F> {
    #[inline]
    fn from(value: f32) -> Self {
        CubicSpline::Constant(value)
    }
}

pub struct Builder<F: RangeFunction> {
    coordinate: F,
    points: Vec<SplinePoint<F>>,
}

impl<F: RangeFunction> Builder<F> {
    pub fn new(coordinate: F) -> Self {
        Self {
            coordinate,
            points: Vec::new(),
        }
    }

    pub fn add_point<V: Into<CubicSpline<F>>>(mut self, location: f32, value: V, derivative: f32) -> Self {
        self.points.push(SplinePoint {
            location,
            value: value.into(),
            derivative,
        });
        self
    }

    pub fn build(self) -> Result<CubicSpline<F>> {
        CubicSpline::multipoint(self.coordinate, self.points)
    }
}
