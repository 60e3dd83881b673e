//! icc-kv: Namespaced key-value access for ICC services
//!
//! Wraps a single Redis connection and rewrites every `(namespace, key)` pair
//! into the composite key `namespace-key` before issuing the native command.
//! Connection settings are read from the ICC `conf.d` INI files.

pub mod error;
pub mod keys;
pub mod services;

pub use error::{KvError, Result};
pub use keys::{composite_key, scan_pattern, strip_namespace, KEY_SEPARATOR};
pub use services::{KvService, RedisSettings, SettingsLoader, StoredValue};
