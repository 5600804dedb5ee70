//! Error types for votetally

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Storage Errors ===
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Vote item not found: {0}")]
    NotFound(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    // === Routing Errors ===
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Partition key {key} is outside this partition's range [{low}, {high}]")]
    Misrouted { key: i64, low: i64, high: i64 },

    #[error("No partition owns key {0}")]
    PartitionNotFound(i64),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    // === Network Errors ===
    #[error("Partition {partition} unreachable: {reason}")]
    PartitionUnreachable { partition: i64, reason: String },

    #[error("All {0} partitions unreachable")]
    AllPartitionsUnreachable(usize),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(_)
                | Error::PartitionUnreachable { .. }
                | Error::AllPartitionsUnreachable(_)
                | Error::ServiceUnavailable(_)
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) | Error::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Misrouted { .. } => StatusCode::MISDIRECTED_REQUEST,
            Error::StorageUnavailable(_)
            | Error::PartitionUnreachable { .. }
            | Error::AllPartitionsUnreachable(_)
            | Error::ServiceUnavailable(_)
            | Error::PartitionNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        (self.to_http_status(), self.to_string()).into_response()
    }
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::StorageUnavailable(e.into_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
