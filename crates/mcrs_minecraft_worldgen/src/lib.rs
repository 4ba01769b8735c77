pub mod aquifer;
pub mod block;
pub mod climate;
pub mod density_function;
pub mod error;
pub mod math;
pub mod noise;
pub mod proto;
pub mod random_state;
pub mod spline;
pub mod surface;
