use thiserror::Error;

use crate::engine::WorkerOutcome;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(String),
    #[error("matrix error: {0}")]
    Matrix(#[from] tm_matrix::MatrixError),
    #[error("shared memory error: {0}")]
    Shm(#[from] tm_shm::ShmError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{} of {total} workers did not complete; result is incomplete", .failures.len())]
    IncompleteResult {
        failures: Vec<WorkerOutcome>,
        total: usize,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
