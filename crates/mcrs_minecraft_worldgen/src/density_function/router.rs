use crate::density_function::build::{DensityFunctionBuilder, WorldgenRegistries};
use crate::density_function::{DensityFunction, DensityVisitor};
use crate::error::Result;
use crate::proto;
use rustc_hash::FxHashMap;
use std::sync::Arc;

macro_rules! router_fields {
    ($mac:ident) => {
        $mac! {
            barrier,
            fluid_level_floodedness,
            fluid_level_spread,
            lava,
            temperature,
            vegetation,
            continents,
            erosion,
            depth,
            ridges,
            preliminary_surface_level,
            final_density,
            vein_toggle,
            vein_ridged,
            vein_gap
        }
    };
}

macro_rules! define_router {
    ($($field:ident),*) => {
        /// The density functions a dimension's generator reads from.
        #[derive(Clone, Debug)]
        pub struct NoiseRouter {
            $(pub $field: Arc<DensityFunction>,)*
        }

        impl NoiseRouter {
            pub fn from_proto(router: &proto::NoiseRouter, registries: &WorldgenRegistries) -> Result<Self> {
                let mut builder = DensityFunctionBuilder::new(registries);
                Ok(NoiseRouter {
                    $($field: builder.build(&router.$field)?,)*
                })
            }

            /// Rewrites every entry with one visitor; nodes shared between entries stay shared.
            pub fn transform<V>(&self, visitor: &mut V) -> Result<Self>
            where
                V: DensityVisitor + ?Sized,
            {
                let mut memo = FxHashMap::default();
                Ok(NoiseRouter {
                    $($field: DensityFunction::transform_memo(&self.$field, visitor, &mut memo)?,)*
                })
            }

            pub fn entries(&self) -> Vec<(&'static str, &Arc<DensityFunction>)> {
                vec![$((stringify!($field), &self.$field),)*]
            }
        }
    };
}

router_fields!(define_router);
