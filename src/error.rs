use std::path::PathBuf;

/// Error taxonomy for the milling workflow.
///
/// Per-sample failures (`MissingUserSelection`) abort only the lamella they
/// occur on; `HardwareLimitExceeded` is absorbed at the realignment layer;
/// configuration errors are fatal before any milling begins.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("image shapes differ: {reference:?} vs {target:?}")]
    ShapeMismatch {
        reference: (usize, usize),
        target: (usize, usize),
    },

    #[error("degenerate image: zero variance, cannot {operation}")]
    DegenerateImage { operation: &'static str },

    #[error("{name} = {value} is outside the valid range [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("beam shift ({requested_x:.3e}, {requested_y:.3e}) m exceeds travel limit {limit:.3e} m")]
    HardwareLimitExceeded {
        requested_x: f64,
        requested_y: f64,
        limit: f64,
    },

    #[error("operator declined to select a {what} for lamella {lamella}")]
    MissingUserSelection { what: &'static str, lamella: usize },

    #[error("invalid configuration:\n{}", .0.join("\n"))]
    InvalidConfig(Vec<String>),

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
