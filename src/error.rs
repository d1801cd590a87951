//! Domain errors for the azulejo pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the preprocessing, topology, training and serving layers
#[derive(Debug, Error)]
pub enum AzulejoError {
    /// The image size cannot be reached by doubling from a 4x4 tile
    #[error("image size must be a power of two >= 4, got {0}")]
    InvalidImageSize(i64),

    /// Networks need at least one channel
    #[error("channel count must be >= 1, got {0}")]
    InvalidChannels(i64),

    /// Kernels must be odd so "same" padding is symmetric
    #[error("kernel size must be odd and >= 1, got {0}")]
    InvalidKernel(i64),

    /// The filter floor must sit between 1 and the ceiling
    #[error("invalid filter range: min {min}, max {max}")]
    InvalidFilterRange { min: i64, max: i64 },

    /// Only grayscale and RGB tiles can be loaded or rendered
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(i64),

    /// A dataset image does not match the configured square size
    #[error("{path} is {width}x{height}, expected {expected}x{expected}")]
    ImageSizeMismatch {
        path: PathBuf,
        width: u32,
        height: u32,
        expected: u32,
    },

    /// No result directory was configured for a training run
    #[error("no result directory configured for the training run")]
    MissingResultDir,

    /// The result directory of a training run does not exist
    #[error("result directory {0} does not exist")]
    ResultDirNotFound(PathBuf),

    /// The model path holds no usable generator file
    #[error("no generator model found at {0}")]
    NoModelFound(PathBuf),

    /// A generator tensor had an unexpected shape
    #[error("unexpected generator output shape {0:?}")]
    UnexpectedShape(Vec<i64>),
}
