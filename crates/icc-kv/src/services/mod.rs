//! KV Service implementation
//!
//! This module provides the namespaced key-value façade over a single Redis
//! connection, the settings bootstrap that locates that Redis instance, and
//! the value normalisation applied on writes.

mod config;
mod kv_service;
mod scan;
mod value;

pub use config::{RedisSettings, SettingsLoader, DEFAULT_CONFIG_GLOBS, DEFAULT_ENV_PREFIX};
pub use kv_service::KvService;
pub use scan::{COLLECTION_SCAN_COUNT, KEYSPACE_SCAN_COUNT};
pub use value::StoredValue;
