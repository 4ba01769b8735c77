use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldgenError {
    #[error("parameter range min > max: {min} {max}")]
    InvalidRange { min: f32, max: f32 },
    #[error("need at least one entry to build a search tree")]
    EmptySearchTree,
    #[error("unknown density function: {0}")]
    UnknownDensityFunction(String),
    #[error("unknown noise: {0}")]
    UnknownNoise(String),
    #[error("density function references itself: {0}")]
    CyclicReference(String),
    #[error("invalid noise parameters: {0}")]
    InvalidNoise(String),
    #[error("invalid spline: {0}")]
    InvalidSpline(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = WorldgenError> = std::result::Result<T, E>;
