pub mod blended_noise;
pub mod improved_noise;
pub mod normal_noise;
pub mod octave_perlin_noise;
pub mod simplex_noise;

use serde::{Deserialize, Serialize};

/// Octave layout of a [`normal_noise::NormalNoise`]: first octave and per-octave amplitudes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParam {
    #[serde(rename = "firstOctave")]
    pub first_octave: i32,
    pub amplitudes: Vec<f64>,
}

impl Default for NoiseParam {
    fn default() -> Self {
        Self {
            first_octave: -1,
            amplitudes: vec![1.0],
        }
    }
}

impl NoiseParam {
    pub fn new(first_octave: i32, amplitudes: Vec<f64>) -> Self {
        Self {
            first_octave,
            amplitudes,
        }
    }
}

impl From<Noises> for NoiseParam {
    #[inline]
    fn from(noise: Noises) -> Self {
        noise.to_noise_param()
    }
}

/// Built-in noise parameter sets, registered by default under their namespaced names.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Copy)]
pub enum Noises {
    Temperature,
    Vegetation,
    Continentalness,
    Erosion,
    TemperatureLarge,
    VegetationLarge,
    ContinentalnessLarge,
    ErosionLarge,
    Ridge,
    Offset,
    AquiferBarrier,
    AquiferFluidLevelFloodedness,
    AquiferLava,
    AquiferFluidLevelSpread,
    Pillar,
    PillarRareness,
    PillarThickness,
    Spaghetti2D,
    Spaghetti2DElevation,
    Spaghetti2DModulator,
    Spaghetti2DThickness,
    Spaghetti3D1,
    Spaghetti3D2,
    Spaghetti3DRarity,
    Spaghetti3DThickness,
    SpaghettiRoughness,
    SpaghettiRoughnessModulator,
    CaveEntrance,
    CaveLayer,
    CaveCheese,
    OreVeininess,
    OreVeinA,
    OreVeinB,
    OreGap,
    Noodle,
    NoodleThickness,
    NoodleRidgeA,
    NoodleRidgeB,
    Jagged,
    Surface,
    SurfaceSecondary,
    ClayBandsOffset,
    BadlandsPillar,
    BadlandsPillarRoof,
    BadlandsSurface,
    IcebergPillar,
    IcebergPillarRoof,
    IcebergSurface,
    SurfaceSwamp,
    Calcite,
    Gravel,
    PowderSnow,
    PackedIce,
    Ice,
    SoulSandLayer,
    GravelLayer,
    Patch,
    Netherrack,
    NetherWart,
    NetherStateSelector,
}

impl Noises {
    pub const ALL: [Noises; 60] = [
        Noises::Temperature,
        Noises::Vegetation,
        Noises::Continentalness,
        Noises::Erosion,
        Noises::TemperatureLarge,
        Noises::VegetationLarge,
        Noises::ContinentalnessLarge,
        Noises::ErosionLarge,
        Noises::Ridge,
        Noises::Offset,
        Noises::AquiferBarrier,
        Noises::AquiferFluidLevelFloodedness,
        Noises::AquiferLava,
        Noises::AquiferFluidLevelSpread,
        Noises::Pillar,
        Noises::PillarRareness,
        Noises::PillarThickness,
        Noises::Spaghetti2D,
        Noises::Spaghetti2DElevation,
        Noises::Spaghetti2DModulator,
        Noises::Spaghetti2DThickness,
        Noises::Spaghetti3D1,
        Noises::Spaghetti3D2,
        Noises::Spaghetti3DRarity,
        Noises::Spaghetti3DThickness,
        Noises::SpaghettiRoughness,
        Noises::SpaghettiRoughnessModulator,
        Noises::CaveEntrance,
        Noises::CaveLayer,
        Noises::CaveCheese,
        Noises::OreVeininess,
        Noises::OreVeinA,
        Noises::OreVeinB,
        Noises::OreGap,
        Noises::Noodle,
        Noises::NoodleThickness,
        Noises::NoodleRidgeA,
        Noises::NoodleRidgeB,
        Noises::Jagged,
        Noises::Surface,
        Noises::SurfaceSecondary,
        Noises::ClayBandsOffset,
        Noises::BadlandsPillar,
        Noises::BadlandsPillarRoof,
        Noises::BadlandsSurface,
        Noises::IcebergPillar,
        Noises::IcebergPillarRoof,
        Noises::IcebergSurface,
        Noises::SurfaceSwamp,
        Noises::Calcite,
        Noises::Gravel,
        Noises::PowderSnow,
        Noises::PackedIce,
        Noises::Ice,
        Noises::SoulSandLayer,
        Noises::GravelLayer,
        Noises::Patch,
        Noises::Netherrack,
        Noises::NetherWart,
        Noises::NetherStateSelector,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Noises::Temperature => "minecraft:temperature",
            Noises::Vegetation => "minecraft:vegetation",
            Noises::Continentalness => "minecraft:continentalness",
            Noises::Erosion => "minecraft:erosion",
            Noises::TemperatureLarge => "minecraft:temperature_large",
            Noises::VegetationLarge => "minecraft:vegetation_large",
            Noises::ContinentalnessLarge => "minecraft:continentalness_large",
            Noises::ErosionLarge => "minecraft:erosion_large",
            Noises::Ridge => "minecraft:ridge",
            Noises::Offset => "minecraft:offset",
            Noises::AquiferBarrier => "minecraft:aquifer_barrier",
            Noises::AquiferFluidLevelFloodedness => "minecraft:aquifer_fluid_level_floodedness",
            Noises::AquiferLava => "minecraft:aquifer_lava",
            Noises::AquiferFluidLevelSpread => "minecraft:aquifer_fluid_level_spread",
            Noises::Pillar => "minecraft:pillar",
            Noises::PillarRareness => "minecraft:pillar_rareness",
            Noises::PillarThickness => "minecraft:pillar_thickness",
            Noises::Spaghetti2D => "minecraft:spaghetti_2d",
            Noises::Spaghetti2DElevation => "minecraft:spaghetti_2d_elevation",
            Noises::Spaghetti2DModulator => "minecraft:spaghetti_2d_modulator",
            Noises::Spaghetti2DThickness => "minecraft:spaghetti_2d_thickness",
            Noises::Spaghetti3D1 => "minecraft:spaghetti_3d_1",
            Noises::Spaghetti3D2 => "minecraft:spaghetti_3d_2",
            Noises::Spaghetti3DRarity => "minecraft:spaghetti_3d_rarity",
            Noises::Spaghetti3DThickness => "minecraft:spaghetti_3d_thickness",
            Noises::SpaghettiRoughness => "minecraft:spaghetti_roughness",
            Noises::SpaghettiRoughnessModulator => "minecraft:spaghetti_roughness_modulator",
            Noises::CaveEntrance => "minecraft:cave_entrance",
            Noises::CaveLayer => "minecraft:cave_layer",
            Noises::CaveCheese => "minecraft:cave_cheese",
            Noises::OreVeininess => "minecraft:ore_veininess",
            Noises::OreVeinA => "minecraft:ore_vein_a",
            Noises::OreVeinB => "minecraft:ore_vein_b",
            Noises::OreGap => "minecraft:ore_gap",
            Noises::Noodle => "minecraft:noodle",
            Noises::NoodleThickness => "minecraft:noodle_thickness",
            Noises::NoodleRidgeA => "minecraft:noodle_ridge_a",
            Noises::NoodleRidgeB => "minecraft:noodle_ridge_b",
            Noises::Jagged => "minecraft:jagged",
            Noises::Surface => "minecraft:surface",
            Noises::SurfaceSecondary => "minecraft:surface_secondary",
            Noises::ClayBandsOffset => "minecraft:clay_bands_offset",
            Noises::BadlandsPillar => "minecraft:badlands_pillar",
            Noises::BadlandsPillarRoof => "minecraft:badlands_pillar_roof",
            Noises::BadlandsSurface => "minecraft:badlands_surface",
            Noises::IcebergPillar => "minecraft:iceberg_pillar",
            Noises::IcebergPillarRoof => "minecraft:iceberg_pillar_roof",
            Noises::IcebergSurface => "minecraft:iceberg_surface",
            Noises::SurfaceSwamp => "minecraft:surface_swamp",
            Noises::Calcite => "minecraft:calcite",
            Noises::Gravel => "minecraft:gravel",
            Noises::PowderSnow => "minecraft:powder_snow",
            Noises::PackedIce => "minecraft:packed_ice",
            Noises::Ice => "minecraft:ice",
            Noises::SoulSandLayer => "minecraft:soul_sand_layer",
            Noises::GravelLayer => "minecraft:gravel_layer",
            Noises::Patch => "minecraft:patch",
            Noises::Netherrack => "minecraft:netherrack",
            Noises::NetherWart => "minecraft:nether_wart",
            Noises::NetherStateSelector => "minecraft:nether_state_selector",
        }
    }

    pub fn from_name(name: &str) -> Option<Noises> {
        Self::ALL.into_iter().find(|noise| noise.name() == name)
    }

    pub fn to_noise_param(self) -> NoiseParam {
        match self {
            Noises::Temperature => NoiseParam::new(-10, vec![1.5, 0.0, 1.0, 0.0, 0.0, 0.0]),
            Noises::Vegetation => NoiseParam::new(-8, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
            Noises::Continentalness => {
                NoiseParam::new(-9, vec![1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0])
            }
            Noises::Erosion => NoiseParam::new(-9, vec![1.0, 1.0, 0.0, 1.0, 1.0]),
            Noises::TemperatureLarge => NoiseParam::new(-12, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Noises::VegetationLarge => NoiseParam::new(-10, vec![1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
            Noises::ContinentalnessLarge => {
                NoiseParam::new(-11, vec![1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0])
            }
            Noises::ErosionLarge => NoiseParam::new(-11, vec![1.0, 1.0, 0.0, 1.0, 1.0]),
            Noises::Ridge => NoiseParam::new(-7, vec![1.0, 2.0, 1.0, 0.0, 0.0, 0.0]),
            Noises::Offset => NoiseParam::new(-3, vec![1.0, 1.0, 1.0, 0.0]),
            Noises::AquiferBarrier => NoiseParam::new(-3, vec![1.0]),
            Noises::AquiferFluidLevelFloodedness => NoiseParam::new(-7, vec![1.0]),
            Noises::AquiferLava => NoiseParam::new(-1, vec![1.0]),
            Noises::AquiferFluidLevelSpread => NoiseParam::new(-5, vec![1.0]),
            Noises::Pillar => NoiseParam::new(-7, vec![1.0, 1.0]),
            Noises::PillarRareness => NoiseParam::new(-8, vec![1.0]),
            Noises::PillarThickness => NoiseParam::new(-8, vec![1.0]),
            Noises::Spaghetti2D => NoiseParam::new(-7, vec![1.0]),
            Noises::Spaghetti2DElevation => NoiseParam::new(-8, vec![1.0]),
            Noises::Spaghetti2DModulator => NoiseParam::new(-11, vec![1.0]),
            Noises::Spaghetti2DThickness => NoiseParam::new(-11, vec![1.0]),
            Noises::Spaghetti3D1 => NoiseParam::new(-7, vec![1.0]),
            Noises::Spaghetti3D2 => NoiseParam::new(-7, vec![1.0]),
            Noises::Spaghetti3DRarity => NoiseParam::new(-11, vec![1.0]),
            Noises::Spaghetti3DThickness => NoiseParam::new(-8, vec![1.0]),
            Noises::SpaghettiRoughness => NoiseParam::new(-5, vec![1.0]),
            Noises::SpaghettiRoughnessModulator => NoiseParam::new(-8, vec![1.0]),
            Noises::CaveEntrance => NoiseParam::new(-7, vec![0.4, 0.5, 1.0]),
            Noises::CaveLayer => NoiseParam::new(-8, vec![1.0]),
            Noises::CaveCheese => {
                NoiseParam::new(-8, vec![0.5, 1.0, 2.0, 1.0, 2.0, 1.0, 0.0, 2.0, 0.0])
            }
            Noises::OreVeininess => NoiseParam::new(-8, vec![1.0]),
            Noises::OreVeinA => NoiseParam::new(-7, vec![1.0]),
            Noises::OreVeinB => NoiseParam::new(-7, vec![1.0]),
            Noises::OreGap => NoiseParam::new(-5, vec![1.0]),
            Noises::Noodle => NoiseParam::new(-8, vec![1.0]),
            Noises::NoodleThickness => NoiseParam::new(-8, vec![1.0]),
            Noises::NoodleRidgeA => NoiseParam::new(-7, vec![1.0]),
            Noises::NoodleRidgeB => NoiseParam::new(-7, vec![1.0]),
            Noises::Jagged => NoiseParam::new(
                -16,
                vec![
                    1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
                ],
            ),
            Noises::Surface => NoiseParam::new(-6, vec![1.0, 1.0, 1.0]),
            Noises::SurfaceSecondary => NoiseParam::new(-6, vec![1.0, 1.0, 0.0, 1.0]),
            Noises::ClayBandsOffset => NoiseParam::new(-8, vec![1.0]),
            Noises::BadlandsPillar => NoiseParam::new(-2, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::BadlandsPillarRoof => NoiseParam::new(-8, vec![1.0]),
            Noises::BadlandsSurface => NoiseParam::new(-6, vec![1.0, 1.0, 1.0]),
            Noises::IcebergPillar => NoiseParam::new(-6, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::IcebergPillarRoof => NoiseParam::new(-3, vec![1.0]),
            Noises::IcebergSurface => NoiseParam::new(-6, vec![1.0, 1.0, 1.0]),
            Noises::SurfaceSwamp => NoiseParam::new(-2, vec![1.0]),
            Noises::Calcite => NoiseParam::new(-9, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::Gravel => NoiseParam::new(-8, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::PowderSnow => NoiseParam::new(-6, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::PackedIce => NoiseParam::new(-7, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::Ice => NoiseParam::new(-4, vec![1.0, 1.0, 1.0, 1.0]),
            Noises::SoulSandLayer => {
                NoiseParam::new(-8, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0 / 75.0])
            }
            Noises::GravelLayer => {
                NoiseParam::new(-8, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0 / 75.0])
            }
            Noises::Patch => NoiseParam::new(-5, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0 / 75.0]),
            Noises::Netherrack => NoiseParam::new(-3, vec![1.0, 0.0, 0.0, 0.35]),
            Noises::NetherWart => NoiseParam::new(-3, vec![1.0, 0.0, 0.0, 0.9]),
            Noises::NetherStateSelector => NoiseParam::new(-4, vec![1.0]),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::noise::{NoiseParam, Noises};

    #[test]
    fn names_round_trip() {
        for noise in Noises::ALL {
            assert_eq!(Noises::from_name(noise.name()), Some(noise));
        }
        assert_eq!(Noises::from_name("minecraft:unknown"), None);
    }

    #[test]
    fn param_json() {
        let param: NoiseParam =
            serde_json::from_str(r#"{"firstOctave": -7, "amplitudes": [1.0, 0.5]}"#).unwrap();
        assert_eq!(param, NoiseParam::new(-7, vec![1.0, 0.5]));
        assert_eq!(NoiseParam::from(Noises::Ridge).first_octave, -7);
    }
}
