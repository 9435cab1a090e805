use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixError {
    #[error("dimension mismatch: expected {expected}x{expected}, got {got}x{got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("buffer length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("tile size must be at least 1, got {0}")]
    InvalidTileSize(usize),
    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),
    #[error("tile range [{start}, {end}) exceeds grid of {total} tiles")]
    RangeOutOfBounds { start: usize, end: usize, total: usize },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MatrixError>;
