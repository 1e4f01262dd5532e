use crate::domain::ports::GatewayError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LipaError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("You can only rate a vehicle you have successfully paid for.")]
    NotEligible,
    #[error("You can only rate this vehicle once per day.")]
    AlreadyRated,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LipaError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LipaError>;
