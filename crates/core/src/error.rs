use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChurroError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid extract source: {0}")]
    InvalidSource(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("cluster error: {0}")]
    Cluster(String),

    #[error("launch error: {0}")]
    Launch(String),

    #[error("upload error: {0}")]
    Upload(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ChurroError>;
