use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShmError {
    #[error("invalid segment name {0:?}")]
    InvalidName(String),
    #[error("segment size must be non-zero")]
    ZeroSize,
    #[error("segment {0} already exists")]
    AlreadyExists(String),
    #[error("segment {0} does not exist")]
    NotFound(String),
    #[error("segment {name} is {actual} bytes, expected at least {expected}")]
    TooSmall {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("{op} failed for segment {name}: {source}")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("segment {0} is not mapped")]
    Unavailable(String),
    #[error("named shared memory is not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, ShmError>;
