//! Error types for the KV service

use thiserror::Error;

/// Errors that can occur in the KV service
#[derive(Error, Debug)]
pub enum KvError {
    /// Errors raised by the store itself, passed through untouched
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config glob: {0}")]
    Glob(String),

    #[error("Missing setting '{key}' (searched: {searched:?})")]
    MissingSetting { key: String, searched: Vec<String> },
}

pub type Result<T> = std::result::Result<T, KvError>;
