use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no benchmark results to export")]
    NoResults,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
