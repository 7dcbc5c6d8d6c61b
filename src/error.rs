use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageProfitError {
    #[error("Invalid exchange rate {0}: must be a positive, finite number")]
    InvalidExchangeRate(f64),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("No snapshot with id: {0}")]
    SnapshotNotFound(String),

    #[error("Blob store error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PageProfitError>;
