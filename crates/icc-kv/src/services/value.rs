//! Normalisation of values written to Redis
//!
//! Existing ICC readers expect "no value" as `None` and booleans as
//! `True`/`False`, so writes go through `StoredValue` rather than the
//! `redis` crate's own encodings (`0`/`1` for booleans).

use redis::{RedisWrite, ToRedisArgs};

/// A value as it will be written by SET, HSET, HSETNX and HMSET
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl ToRedisArgs for StoredValue {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match self {
            StoredValue::Null => out.write_arg(b"None"),
            StoredValue::Bool(true) => out.write_arg(b"True"),
            StoredValue::Bool(false) => out.write_arg(b"False"),
            StoredValue::Int(i) => out.write_arg_fmt(i),
            StoredValue::Float(f) => out.write_arg(legacy_float(*f).as_bytes()),
            StoredValue::Text(s) => out.write_arg(s.as_bytes()),
            StoredValue::Bytes(b) => out.write_arg(b),
        }
    }
}

/// Integral floats keep their fraction (`1.0`, not `1`), as legacy writers did
fn legacy_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

impl From<bool> for StoredValue {
    fn from(value: bool) -> Self {
        StoredValue::Bool(value)
    }
}

impl From<i32> for StoredValue {
    fn from(value: i32) -> Self {
        StoredValue::Int(value.into())
    }
}

impl From<u32> for StoredValue {
    fn from(value: u32) -> Self {
        StoredValue::Int(value.into())
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Int(value)
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        StoredValue::Float(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Text(value.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::Text(value)
    }
}

impl From<&String> for StoredValue {
    fn from(value: &String) -> Self {
        StoredValue::Text(value.clone())
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        StoredValue::Bytes(value)
    }
}

impl From<&[u8]> for StoredValue {
    fn from(value: &[u8]) -> Self {
        StoredValue::Bytes(value.to_vec())
    }
}

impl<T: Into<StoredValue>> From<Option<T>> for StoredValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(StoredValue::Null, Into::into)
    }
}
