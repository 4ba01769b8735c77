use crate::density_function::RarityValueMapper;
use crate::noise::NoiseParam;
use crate::noise::blended_noise::BlendedNoiseParams;
use serde::{Deserialize, Serialize};

/// A density function as written in data: a bare number, a reference to a
/// registered function, or an inline definition.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DensityFunctionHolder {
    Value(f64),
    Reference(String),
    Owned(Box<ProtoDensityFunction>),
}

impl From<f64> for DensityFunctionHolder {
    fn from(value: f64) -> Self {
        DensityFunctionHolder::Value(value)
    }
}

impl From<ProtoDensityFunction> for DensityFunctionHolder {
    fn from(value: ProtoDensityFunction) -> Self {
        DensityFunctionHolder::Owned(Box::new(value))
    }
}

impl From<SingleArgumentFunction> for DensityFunctionHolder {
    fn from(func: SingleArgumentFunction) -> Self {
        func.argument
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProtoDensityFunction {
    #[serde(rename = "minecraft:blend_alpha", alias = "blend_alpha")]
    BlendAlpha,
    #[serde(rename = "minecraft:blend_offset", alias = "blend_offset")]
    BlendOffset,
    #[serde(rename = "minecraft:beardifier", alias = "beardifier")]
    Beardifier,
    #[serde(rename = "minecraft:old_blended_noise", alias = "old_blended_noise")]
    OldBlendedNoise(BlendedNoiseParams),
    #[serde(rename = "minecraft:interpolated", alias = "interpolated")]
    Interpolated(SingleArgumentFunction),
    #[serde(rename = "minecraft:flat_cache", alias = "flat_cache")]
    FlatCache(SingleArgumentFunction),
    #[serde(rename = "minecraft:cache_2d", alias = "cache_2d")]
    Cache2d(SingleArgumentFunction),
    #[serde(rename = "minecraft:cache_once", alias = "cache_once")]
    CacheOnce(SingleArgumentFunction),
    #[serde(rename = "minecraft:cache_all_in_cell", alias = "cache_all_in_cell")]
    CacheAllInCell(SingleArgumentFunction),
    #[serde(rename = "minecraft:noise", alias = "noise")]
    Noise {
        noise: NoiseReference,
        xz_scale: f64,
        y_scale: f64,
    },
    #[serde(rename = "minecraft:end_islands", alias = "end_islands")]
    EndIslands,
    #[serde(rename = "minecraft:weird_scaled_sampler", alias = "weird_scaled_sampler")]
    WeirdScaledSampler {
        input: DensityFunctionHolder,
        noise: NoiseReference,
        rarity_value_mapper: RarityValueMapper,
    },
    #[serde(rename = "minecraft:shifted_noise", alias = "shifted_noise")]
    ShiftedNoise {
        shift_x: DensityFunctionHolder,
        shift_y: DensityFunctionHolder,
        shift_z: DensityFunctionHolder,
        xz_scale: f64,
        y_scale: f64,
        noise: NoiseReference,
    },
    #[serde(rename = "minecraft:range_choice", alias = "range_choice")]
    RangeChoice {
        input: DensityFunctionHolder,
        min_inclusive: f64,
        max_exclusive: f64,
        when_in_range: DensityFunctionHolder,
        when_out_of_range: DensityFunctionHolder,
    },
    #[serde(rename = "minecraft:shift_a", alias = "shift_a")]
    ShiftA { argument: NoiseReference },
    #[serde(rename = "minecraft:shift_b", alias = "shift_b")]
    ShiftB { argument: NoiseReference },
    #[serde(rename = "minecraft:shift", alias = "shift")]
    Shift { argument: NoiseReference },
    #[serde(rename = "minecraft:blend_density", alias = "blend_density")]
    BlendDensity(SingleArgumentFunction),
    #[serde(rename = "minecraft:clamp", alias = "clamp")]
    Clamp {
        input: DensityFunctionHolder,
        min: f64,
        max: f64,
    },
    #[serde(rename = "minecraft:abs", alias = "abs")]
    Abs(SingleArgumentFunction),
    #[serde(rename = "minecraft:square", alias = "square")]
    Square(SingleArgumentFunction),
    #[serde(rename = "minecraft:cube", alias = "cube")]
    Cube(SingleArgumentFunction),
    #[serde(rename = "minecraft:half_negative", alias = "half_negative")]
    HalfNegative(SingleArgumentFunction),
    #[serde(rename = "minecraft:quarter_negative", alias = "quarter_negative")]
    QuarterNegative(SingleArgumentFunction),
    #[serde(rename = "minecraft:invert", alias = "invert")]
    Invert(SingleArgumentFunction),
    #[serde(rename = "minecraft:squeeze", alias = "squeeze")]
    Squeeze(SingleArgumentFunction),
    #[serde(rename = "minecraft:add", alias = "add")]
    Add(TwoArgumentFunction),
    #[serde(rename = "minecraft:mul", alias = "mul")]
    Mul(TwoArgumentFunction),
    #[serde(rename = "minecraft:min", alias = "min")]
    Min(TwoArgumentFunction),
    #[serde(rename = "minecraft:max", alias = "max")]
    Max(TwoArgumentFunction),
    #[serde(rename = "minecraft:spline", alias = "spline")]
    Spline { spline: SplineHolder },
    #[serde(rename = "minecraft:constant", alias = "constant")]
    Constant { argument: f64 },
    #[serde(rename = "minecraft:y_clamped_gradient", alias = "y_clamped_gradient")]
    YClampedGradient {
        from_y: i32,
        to_y: i32,
        from_value: f64,
        to_value: f64,
    },
    #[serde(rename = "minecraft:find_top_surface", alias = "find_top_surface")]
    FindTopSurface {
        density: DensityFunctionHolder,
        upper_bound: DensityFunctionHolder,
        lower_bound: i32,
        cell_height: i32,
    },
}

/// Noise parameters, either registered by name or given inline.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseReference {
    Reference(String),
    Owned(NoiseParam),
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SingleArgumentFunction {
    pub argument: DensityFunctionHolder,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TwoArgumentFunction {
    pub argument1: DensityFunctionHolder,
    pub argument2: DensityFunctionHolder,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplineHolder {
    Constant(f64),
    Spline(Spline),
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Spline {
    pub coordinate: DensityFunctionHolder,
    pub points: Vec<SplinePoint>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SplinePoint {
    pub location: f64,
    pub value: SplineHolder,
    pub derivative: f64,
}

#[cfg(test)]
mod test {
    use crate::density_function::RarityValueMapper;
    use crate::density_function::proto::{
        DensityFunctionHolder, NoiseReference, ProtoDensityFunction, SplineHolder,
    };

    #[test]
    fn accepts_both_spellings() {
        let long: ProtoDensityFunction =
            serde_json::from_str(r#"{"type": "minecraft:add", "argument1": 1.0, "argument2": "minecraft:zero"}"#)
                .unwrap();
        let short: ProtoDensityFunction =
            serde_json::from_str(r#"{"type": "add", "argument1": 1.0, "argument2": "minecraft:zero"}"#).unwrap();
        assert_eq!(long, short);
        let ProtoDensityFunction::Add(args) = long else {
            panic!("expected add");
        };
        assert_eq!(args.argument1, DensityFunctionHolder::Value(1.0));
        assert_eq!(args.argument2, DensityFunctionHolder::Reference("minecraft:zero".to_owned()));
    }

    #[test]
    fn nested_definitions() {
        let function: DensityFunctionHolder = serde_json::from_str(
            r#"{
                "type": "minecraft:weird_scaled_sampler",
                "input": {"type": "minecraft:cache_once", "argument": "overworld/ridges"},
                "noise": {"firstOctave": -7, "amplitudes": [1.0, 0.5]},
                "rarity_value_mapper": "type_1"
            }"#,
        )
        .unwrap();
        let DensityFunctionHolder::Owned(function) = function else {
            panic!("expected an inline function");
        };
        let ProtoDensityFunction::WeirdScaledSampler {
            input,
            noise,
            rarity_value_mapper,
        } = *function
        else {
            panic!("expected a weird scaled sampler");
        };
        assert_eq!(rarity_value_mapper, RarityValueMapper::Type1);
        assert!(matches!(noise, NoiseReference::Owned(ref params) if params.first_octave == -7));
        assert!(matches!(input, DensityFunctionHolder::Owned(_)));
    }

    #[test]
    fn splines() {
        let function: ProtoDensityFunction = serde_json::from_str(
            r#"{
                "type": "minecraft:spline",
                "spline": {
                    "coordinate": "minecraft:overworld/continents",
                    "points": [
                        {"location": -1.1, "value": 0.044, "derivative": 0.0},
                        {"location": 0.2, "value": {
                            "coordinate": "minecraft:overworld/erosion",
                            "points": [{"location": 0.0, "value": 0.5, "derivative": 0.1}]
                        }, "derivative": 0.0}
                    ]
                }
            }"#,
        )
        .unwrap();
        let ProtoDensityFunction::Spline {
            spline: SplineHolder::Spline(spline),
        } = function
        else {
            panic!("expected a spline");
        };
        assert_eq!(spline.points.len(), 2);
        assert_eq!(spline.points[0].value, SplineHolder::Constant(0.044));
        assert!(matches!(spline.points[1].value, SplineHolder::Spline(_)));
    }

    #[test]
    fn constants_and_markers() {
        let function: ProtoDensityFunction =
            serde_json::from_str(r#"{"type": "minecraft:constant", "argument": -0.5}"#).unwrap();
        assert_eq!(function, ProtoDensityFunction::Constant { argument: -0.5 });
        let function: ProtoDensityFunction = serde_json::from_str(r#"{"type": "beardifier"}"#).unwrap();
        assert_eq!(function, ProtoDensityFunction::Beardifier);
    }
}
