use crate::error::{Result, WorldgenError};
use crate::proto::Interval;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod sampler;
pub mod search_tree;

/// Number of axes in parameter space: six climate values plus the offset.
pub const PARAMETER_COUNT: usize = 7;

/// A climate value in fixed point, `value * 10000` computed in single precision.
#[derive(Clone, Debug, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "f32")]
#[serde(into = "f32")]
pub struct QuantizedCoord(pub i64);

impl From<f32> for QuantizedCoord {
    #[inline]
    fn from(value: f32) -> Self {
        QuantizedCoord(QuantizedCoord::quantize_coord(value))
    }
}

impl From<f64> for QuantizedCoord {
    #[inline]
    fn from(value: f64) -> Self {
        QuantizedCoord(QuantizedCoord::quantize_coord(value as f32))
    }
}

impl From<QuantizedCoord> for f32 {
    #[inline]
    fn from(value: QuantizedCoord) -> Self {
        QuantizedCoord::unquantize_coord(value.0)
    }
}

impl From<QuantizedCoord> for i64 {
    #[inline]
    fn from(value: QuantizedCoord) -> Self {
        value.0
    }
}

impl From<i64> for QuantizedCoord {
    #[inline]
    fn from(value: i64) -> Self {
        QuantizedCoord(value)
    }
}

impl QuantizedCoord {
    #[inline]
    pub fn quantize_coord(coord: f32) -> i64 {
        (coord * 10000.0) as i64
    }

    #[inline]
    pub fn unquantize_coord(coord: i64) -> f32 {
        coord as f32 / 10000.0
    }
}

/// Closed range on one climate axis (a `ParameterRange`). Always `min <= max`.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Interval<QuantizedCoord>")]
#[serde(into = "Interval<QuantizedCoord>")]
pub struct Param {
    min: QuantizedCoord,
    max: QuantizedCoord,
}

impl<I: Into<QuantizedCoord>> From<I> for Param {
    fn from(value: I) -> Self {
        let value = value.into();
        Param {
            min: value,
            max: value,
        }
    }
}

impl Param {
    pub fn span<I: Into<QuantizedCoord>>(min: I, max: I) -> Result<Param> {
        let min = min.into();
        let max = max.into();
        if min > max {
            return Err(WorldgenError::InvalidRange {
                min: min.into(),
                max: max.into(),
            });
        }
        Ok(Param { min, max })
    }

    pub(crate) fn from_quantized(min: i64, max: i64) -> Param {
        debug_assert!(min <= max);
        Param {
            min: QuantizedCoord(min),
            max: QuantizedCoord(max),
        }
    }

    #[inline]
    pub fn min(&self) -> i64 {
        self.min.0
    }

    #[inline]
    pub fn max(&self) -> i64 {
        self.max.0
    }

    /// Gap between `value` and the range, zero inside it.
    #[inline]
    pub fn distance(&self, value: i64) -> i64 {
        let above = value - self.max.0;
        if above > 0 {
            above
        } else {
            (self.min.0 - value).max(0)
        }
    }

    #[inline]
    pub(crate) fn union(&self, other: &Param) -> Param {
        Param::from_quantized(self.min.0.min(other.min.0), self.max.0.max(other.max.0))
    }
}

impl TryFrom<Interval<QuantizedCoord>> for Param {
    type Error = WorldgenError;

    #[inline]
    fn try_from(value: Interval<QuantizedCoord>) -> Result<Self> {
        Param::span(value.min, value.max)
    }
}

impl From<Param> for Interval<QuantizedCoord> {
    #[inline]
    fn from(value: Param) -> Self {
        Interval {
            min: value.min,
            max: value.max,
        }
    }
}

/// The region of parameter space one biome claims (a `NoiseHypercube`).
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamPoint {
    pub temperature: Param,
    pub humidity: Param,
    pub continentalness: Param,
    pub erosion: Param,
    pub depth: Param,
    pub weirdness: Param,
    pub offset: QuantizedCoord,
}

impl ParamPoint {
    #[inline]
    pub fn new<P, Q>(
        temperature: P,
        humidity: P,
        continentalness: P,
        erosion: P,
        depth: P,
        weirdness: P,
        offset: Q,
    ) -> ParamPoint
    where
        P: Into<Param>,
        Q: Into<QuantizedCoord>,
    {
        ParamPoint {
            temperature: temperature.into(),
            humidity: humidity.into(),
            continentalness: continentalness.into(),
            erosion: erosion.into(),
            depth: depth.into(),
            weirdness: weirdness.into(),
            offset: offset.into(),
        }
    }

    pub fn parameter_space(&self) -> [Param; PARAMETER_COUNT] {
        (*self).into()
    }

    /// Sum of squared per-axis gaps to `target`, plus the squared offset.
    pub fn fitness(&self, target: &TargetPoint) -> i64 {
        let axes = [
            self.temperature.distance(target.temperature.0),
            self.humidity.distance(target.humidity.0),
            self.continentalness.distance(target.continentalness.0),
            self.erosion.distance(target.erosion.0),
            self.depth.distance(target.depth.0),
            self.weirdness.distance(target.weirdness.0),
            self.offset.0,
        ];
        axes.iter().map(|d| d.wrapping_mul(*d)).fold(0i64, i64::wrapping_add)
    }
}

impl From<ParamPoint> for [Param; PARAMETER_COUNT] {
    #[inline]
    fn from(value: ParamPoint) -> Self {
        [
            value.temperature,
            value.humidity,
            value.continentalness,
            value.erosion,
            value.depth,
            value.weirdness,
            Param {
                min: value.offset,
                max: value.offset,
            },
        ]
    }
}

/// A sampled climate (a `NoiseValuePoint`).
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, Default)]
pub struct TargetPoint {
    pub temperature: QuantizedCoord,
    pub humidity: QuantizedCoord,
    pub continentalness: QuantizedCoord,
    pub erosion: QuantizedCoord,
    pub depth: QuantizedCoord,
    pub weirdness: QuantizedCoord,
}

impl TargetPoint {
    #[inline]
    pub fn new<Q>(
        temperature: Q,
        humidity: Q,
        continentalness: Q,
        erosion: Q,
        depth: Q,
        weirdness: Q,
    ) -> TargetPoint
    where
        Q: Into<QuantizedCoord>,
    {
        TargetPoint {
            temperature: temperature.into(),
            humidity: humidity.into(),
            continentalness: continentalness.into(),
            erosion: erosion.into(),
            depth: depth.into(),
            weirdness: weirdness.into(),
        }
    }

    /// The point as a query vector; the offset axis is always 0.
    #[inline]
    pub fn to_parameter_array(&self) -> [i64; PARAMETER_COUNT] {
        (*self).into()
    }
}

impl From<TargetPoint> for [i64; PARAMETER_COUNT] {
    #[inline]
    fn from(value: TargetPoint) -> Self {
        [
            value.temperature.0,
            value.humidity.0,
            value.continentalness.0,
            value.erosion.0,
            value.depth.0,
            value.weirdness.0,
            0,
        ]
    }
}

#[cfg(test)]
mod test {
    use crate::climate::{Param, ParamPoint, QuantizedCoord, TargetPoint};

    #[test]
    fn quantizes_in_single_precision() {
        assert_eq!(QuantizedCoord::from(0.55f32).0, 5500);
        assert_eq!(QuantizedCoord::from(-0.11f64).0, -1100);
        assert_eq!(QuantizedCoord::from(1.0f32).0, 10000);
    }

    #[test]
    fn span_validates_order() {
        assert!(Param::span(-1.0f32, 1.0).is_ok());
        assert!(Param::span(0.5f32, 0.5).is_ok());
        assert!(Param::span(0.6f32, 0.5).is_err());
    }

    #[test]
    fn inside_range_has_no_distance() {
        let range = Param::span(-1.0f32, 1.0).unwrap();
        let hypercube = ParamPoint::new(range, range, range, range, range, range, 0.0f32);
        let target = TargetPoint::new(0.0f32, 0.0, 0.0, 0.0, 0.0, 0.0);
        for axis in hypercube.parameter_space().iter().take(6) {
            assert_eq!(axis.distance(0), 0);
        }
        assert_eq!(hypercube.fitness(&target), 0);

        let offset = ParamPoint { offset: QuantizedCoord::from(0.25f32), ..hypercube };
        assert_eq!(offset.fitness(&target), 2500 * 2500);
    }

    #[test]
    fn distance_outside_range() {
        let range = Param::span(-0.5f32, 0.5).unwrap();
        assert_eq!(range.distance(7000), 2000);
        assert_eq!(range.distance(-9000), 4000);
    }

    #[test]
    fn json_accepts_scalars_and_pairs() {
        let point: ParamPoint = serde_json::from_str(
            r#"{"temperature": [-1.0, 1.0], "humidity": 0.2, "continentalness": [-0.11, 0.55],
                "erosion": {"min": -1.0, "max": 0.0}, "depth": 0.0, "weirdness": [0.0, 0.0],
                "offset": 0.375}"#,
        )
        .unwrap();
        assert_eq!(point.humidity.min(), 2000);
        assert_eq!(point.humidity.max(), 2000);
        assert_eq!(point.continentalness.max(), 5500);
        assert_eq!(point.erosion.min(), -10000);
        assert_eq!(point.offset.0, 3750);

        let inverted = serde_json::from_str::<Param>("[0.5, -0.5]");
        assert!(inverted.is_err());
    }
}
