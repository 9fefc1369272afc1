use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("extraction engine failed: {0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("completion failed: {0}")]
    Completion(#[from] ProviderError),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
