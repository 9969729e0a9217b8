use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Failures reported by a [`Backend`](crate::port::outbound::backend::Backend)
/// implementation.
///
/// Adapters map their driver errors into these variants so the engine can
/// decide between retrying, rolling back and replacing a connection without
/// knowing which database is underneath.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    Closed,
}

/// Connection pool errors.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("timed out after {waited:?} waiting for a connection")]
    Timeout { waited: Duration },

    #[error("failed to create connection after {attempts} attempts: {source}")]
    CreationFailed {
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("no valid connection after {attempts} attempts")]
    Unavailable { attempts: u32 },

    #[error("pool is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
