//! KV Service: namespaced delegation to a single shared Redis connection

use std::collections::{HashMap, HashSet};

use futures::Stream;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::{AsyncCommands, ErrorKind, RedisError};
use tracing::{debug, error, info};

use super::config::{RedisSettings, SettingsLoader};
use super::scan::ScanCommand;
use super::value::StoredValue;
use crate::error::Result;
use crate::keys::{composite_key, scan_pattern, strip_namespace};

/// KV Service for key-value operations with namespace isolation
///
/// Every call rewrites `(namespace, key)` into `namespace-key` and issues the
/// matching Redis command on the shared connection. Replies and store errors
/// are returned as-is. Commands not covered here can be issued directly on
/// [`KvService::connection`].
#[derive(Clone)]
pub struct KvService<C = ConnectionManager> {
    conn: C,
}

impl KvService<ConnectionManager> {
    /// Open the shared connection described by `settings`
    pub async fn connect(settings: &RedisSettings) -> Result<Self> {
        let url = settings.connection_url();
        debug!("Creating Redis client for {}", url);

        let client = redis::Client::open(url.as_str()).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            e
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis at {}: {}", url, e);
            e
        })?;

        info!(
            "Connected to Redis at {}:{} (db {})",
            settings.host, settings.port, settings.db
        );

        Ok(Self::with_connection(conn))
    }

    /// Load settings from the default ICC config directories and connect
    pub async fn from_env_config() -> Result<Self> {
        let settings = SettingsLoader::new().load()?;
        Self::connect(&settings).await
    }
}

impl<C> KvService<C>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    /// Wrap an already established connection
    pub fn with_connection(conn: C) -> Self {
        Self { conn }
    }

    /// Handle to the underlying connection for commands not wrapped here
    pub fn connection(&self) -> C {
        self.conn.clone()
    }

    // ========== Basic key commands ==========

    /// Get the string value of a key, `None` if it does not exist
    pub async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV GET {}", composite);

        let result: Option<String> = conn.get(&composite).await?;
        Ok(result)
    }

    /// Get the raw bytes of a key, for values that are not valid UTF-8
    ///
    /// [`KvService::get`] fails with a type error on such values.
    pub async fn get_bytes(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV GET {} (bytes)", composite);

        let result: Option<Vec<u8>> = conn.get(&composite).await?;
        Ok(result)
    }

    /// Set a key, overwriting any value and discarding any TTL
    pub async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: impl Into<StoredValue>,
    ) -> Result<()> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);
        let value = value.into();

        debug!("KV SET {} = {:?}", composite, value);

        let _: () = conn.set(&composite, value).await?;
        Ok(())
    }

    /// Increment the integer stored at a key by one
    pub async fn incr(&self, namespace: &str, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV INCR {}", composite);

        let result: i64 = redis::cmd("INCR")
            .arg(&composite)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    /// Remove a key, returning the number of keys removed
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV DEL {}", composite);

        let deleted: i64 = conn.del(&composite).await?;
        Ok(deleted)
    }

    pub async fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV EXISTS {}", composite);

        let result: bool = conn.exists(&composite).await?;
        Ok(result)
    }

    /// Remove the timeout on a key; `false` if it had none or does not exist
    pub async fn persist(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV PERSIST {}", composite);

        let result: bool = conn.persist(&composite).await?;
        Ok(result)
    }

    /// Set a timeout on a key (in seconds)
    pub async fn expire(&self, namespace: &str, key: &str, seconds: i64) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV EXPIRE {} {}", composite, seconds);

        let result: bool = conn.expire(&composite, seconds).await?;
        Ok(result)
    }

    /// Remaining time to live in seconds: -2 if missing, -1 if no expiry
    pub async fn ttl(&self, namespace: &str, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV TTL {}", composite);

        let result: i64 = conn.ttl(&composite).await?;
        Ok(result)
    }

    /// Rename a key within its namespace
    pub async fn rename(&self, namespace: &str, key: &str, new_key: &str) -> Result<()> {
        let mut conn = self.connection();
        let from = composite_key(namespace, key);
        let to = composite_key(namespace, new_key);

        debug!("KV RENAME {} {}", from, to);

        let _: () = conn.rename(&from, &to).await?;
        Ok(())
    }

    // ========== Hash commands ==========

    pub async fn hget(&self, namespace: &str, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HGET {} {}", composite, field);

        let result: Option<String> = conn.hget(&composite, field).await?;
        Ok(result)
    }

    /// Raw bytes of a hash field, for values that are not valid UTF-8
    pub async fn hget_bytes(
        &self,
        namespace: &str,
        key: &str,
        field: &str,
    ) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HGET {} {} (bytes)", composite, field);

        let result: Option<Vec<u8>> = conn.hget(&composite, field).await?;
        Ok(result)
    }

    pub async fn hdel(&self, namespace: &str, key: &str, field: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HDEL {} {}", composite, field);

        let result: i64 = conn.hdel(&composite, field).await?;
        Ok(result)
    }

    /// Set a hash field, returning 1 if the field is new
    pub async fn hset(
        &self,
        namespace: &str,
        key: &str,
        field: &str,
        value: impl Into<StoredValue>,
    ) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);
        let value = value.into();

        debug!("KV HSET {} {} = {:?}", composite, field, value);

        let result: i64 = conn.hset(&composite, field, value).await?;
        Ok(result)
    }

    /// Set a hash field only if it does not exist yet
    pub async fn hsetnx(
        &self,
        namespace: &str,
        key: &str,
        field: &str,
        value: impl Into<StoredValue>,
    ) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);
        let value = value.into();

        debug!("KV HSETNX {} {} = {:?}", composite, field, value);

        let result: bool = conn.hset_nx(&composite, field, value).await?;
        Ok(result)
    }

    /// Values of several hash fields, `None` for each missing field
    pub async fn hmget(
        &self,
        namespace: &str,
        key: &str,
        fields: &[&str],
    ) -> Result<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HMGET {} {:?}", composite, fields);

        let result: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&composite)
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    /// Set several hash fields at once
    pub async fn hmset<I, F, V>(&self, namespace: &str, key: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: Into<StoredValue>,
    {
        let pairs: Vec<(String, StoredValue)> = pairs
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect();

        if pairs.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HSET {} ({} fields)", composite, pairs.len());

        let _: i64 = redis::cmd("HSET")
            .arg(&composite)
            .arg(&pairs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn hgetall(&self, namespace: &str, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HGETALL {}", composite);

        let result: HashMap<String, String> = conn.hgetall(&composite).await?;
        Ok(result)
    }

    pub async fn hexists(&self, namespace: &str, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HEXISTS {} {}", composite, field);

        let result: bool = conn.hexists(&composite, field).await?;
        Ok(result)
    }

    /// Increment an integer hash field, creating it at 0 if missing
    pub async fn hincrby(
        &self,
        namespace: &str,
        key: &str,
        field: &str,
        amount: i64,
    ) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HINCRBY {} {} {}", composite, field, amount);

        let result: i64 = redis::cmd("HINCRBY")
            .arg(&composite)
            .arg(field)
            .arg(amount)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    /// Increment a float hash field, creating it at 0 if missing
    pub async fn hincrbyfloat(
        &self,
        namespace: &str,
        key: &str,
        field: &str,
        amount: f64,
    ) -> Result<f64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HINCRBYFLOAT {} {} {}", composite, field, amount);

        let result: f64 = redis::cmd("HINCRBYFLOAT")
            .arg(&composite)
            .arg(field)
            .arg(amount)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    pub async fn hlen(&self, namespace: &str, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HLEN {}", composite);

        let result: i64 = conn.hlen(&composite).await?;
        Ok(result)
    }

    /// Length of a hash field's value, 0 if the key or field is missing
    pub async fn hstrlen(&self, namespace: &str, key: &str, field: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HSTRLEN {} {}", composite, field);

        let result: i64 = redis::cmd("HSTRLEN")
            .arg(&composite)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(result)
    }

    pub async fn hkeys(&self, namespace: &str, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HKEYS {}", composite);

        let result: Vec<String> = conn.hkeys(&composite).await?;
        Ok(result)
    }

    pub async fn hvals(&self, namespace: &str, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV HVALS {}", composite);

        let result: Vec<String> = conn.hvals(&composite).await?;
        Ok(result)
    }

    // ========== Set commands ==========

    /// Add a member to a set, returning 1 if it was not already present
    pub async fn sadd(&self, namespace: &str, key: &str, member: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV SADD {} {}", composite, member);

        let result: i64 = conn.sadd(&composite, member).await?;
        Ok(result)
    }

    pub async fn srem(&self, namespace: &str, key: &str, member: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV SREM {} {}", composite, member);

        let result: i64 = conn.srem(&composite, member).await?;
        Ok(result)
    }

    pub async fn smembers(&self, namespace: &str, key: &str) -> Result<HashSet<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV SMEMBERS {}", composite);

        let result: HashSet<String> = conn.smembers(&composite).await?;
        Ok(result)
    }

    pub async fn sismember(&self, namespace: &str, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV SISMEMBER {} {}", composite, member);

        let result: bool = conn.sismember(&composite, member).await?;
        Ok(result)
    }

    pub async fn scard(&self, namespace: &str, key: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV SCARD {}", composite);

        let result: i64 = conn.scard(&composite).await?;
        Ok(result)
    }

    // ========== Sorted set commands ==========

    /// Add a member with a score, or update its score if already present
    pub async fn zadd(&self, namespace: &str, key: &str, score: f64, member: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZADD {} {} {}", composite, score, member);

        let result: i64 = conn.zadd(&composite, member, score).await?;
        Ok(result)
    }

    pub async fn zrem(&self, namespace: &str, key: &str, member: &str) -> Result<i64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZREM {} {}", composite, member);

        let result: i64 = conn.zrem(&composite, member).await?;
        Ok(result)
    }

    pub async fn zscore(&self, namespace: &str, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZSCORE {} {}", composite, member);

        let result: Option<f64> = conn.zscore(&composite, member).await?;
        Ok(result)
    }

    /// Members between two inclusive indexes, lowest score first
    ///
    /// Negative indexes count from the end, `-1` being the last member.
    pub async fn zrange(
        &self,
        namespace: &str,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZRANGE {} {} {}", composite, start, stop);

        let result: Vec<String> = conn.zrange(&composite, start, stop).await?;
        Ok(result)
    }

    pub async fn zrangeall(&self, namespace: &str, key: &str) -> Result<Vec<String>> {
        self.zrange(namespace, key, 0, -1).await
    }

    /// Members between two inclusive indexes, highest score first
    pub async fn zrevrange(
        &self,
        namespace: &str,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZREVRANGE {} {} {}", composite, start, stop);

        let result: Vec<String> = conn.zrevrange(&composite, start, stop).await?;
        Ok(result)
    }

    pub async fn zrevrangeall(&self, namespace: &str, key: &str) -> Result<Vec<String>> {
        self.zrevrange(namespace, key, 0, -1).await
    }

    /// Increment a member's score, adding it at `increment` if missing
    pub async fn zincrby(
        &self,
        namespace: &str,
        key: &str,
        increment: f64,
        member: &str,
    ) -> Result<f64> {
        let mut conn = self.connection();
        let composite = composite_key(namespace, key);

        debug!("KV ZINCRBY {} {} {}", composite, increment, member);

        let result: f64 = conn.zincr(&composite, member, increment).await?;
        Ok(result)
    }

    // ========== Scan commands ==========

    /// One SCAN step over `namespace-prefix*` with the namespace stripped
    ///
    /// Start with cursor 0; a returned cursor of 0 means the scan is complete.
    pub async fn scan_page(
        &self,
        namespace: &str,
        prefix: Option<&str>,
        cursor: u64,
    ) -> Result<(u64, Vec<String>)> {
        let mut conn = self.connection();
        let scan = ScanCommand::keyspace(scan_pattern(namespace, prefix));

        let (next, keys) = scan.step(&mut conn, cursor).await?;
        let keys = keys
            .iter()
            .map(|k| strip_namespace(namespace, k).to_string())
            .collect();

        Ok((next, keys))
    }

    /// Iterate every key in a namespace (optionally under `prefix`)
    ///
    /// Yields logical keys with the `namespace-` prefix removed. Keys may be
    /// repeated if the keyspace changes during the scan.
    pub fn scan_iter(
        &self,
        namespace: &str,
        prefix: Option<&str>,
    ) -> impl Stream<Item = Result<String>> + '_ {
        let namespace = namespace.to_string();
        let pages =
            ScanCommand::keyspace(scan_pattern(&namespace, prefix)).pages(self.connection());

        async_stream::stream! {
            for await page in pages {
                match page {
                    Ok(keys) => {
                        for key in keys {
                            yield Ok(strip_namespace(&namespace, &key).to_string());
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Iterate the members of a set
    pub fn sscan_iter(
        &self,
        namespace: &str,
        key: &str,
        pattern: Option<&str>,
    ) -> impl Stream<Item = Result<String>> + '_ {
        let pages = ScanCommand::collection("SSCAN", composite_key(namespace, key), pattern)
            .pages(self.connection());

        async_stream::stream! {
            for await page in pages {
                match page {
                    Ok(members) => {
                        for member in members {
                            yield Ok(member);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Iterate the `(field, value)` pairs of a hash
    pub fn hscan_iter(
        &self,
        namespace: &str,
        key: &str,
        pattern: Option<&str>,
    ) -> impl Stream<Item = Result<(String, String)>> + '_ {
        let pages = ScanCommand::collection("HSCAN", composite_key(namespace, key), pattern)
            .pages(self.connection());

        async_stream::stream! {
            for await page in pages {
                match page {
                    Ok(items) => {
                        let mut items = items.into_iter();
                        while let (Some(field), Some(value)) = (items.next(), items.next()) {
                            yield Ok((field, value));
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Iterate the `(member, score)` pairs of a sorted set
    pub fn zscan_iter(
        &self,
        namespace: &str,
        key: &str,
        pattern: Option<&str>,
    ) -> impl Stream<Item = Result<(String, f64)>> + '_ {
        let pages = ScanCommand::collection("ZSCAN", composite_key(namespace, key), pattern)
            .pages(self.connection());

        async_stream::stream! {
            for await page in pages {
                let items = match page {
                    Ok(items) => items,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                let mut failed = false;
                let mut items = items.into_iter();
                while let (Some(member), Some(score)) = (items.next(), items.next()) {
                    match parse_score(&score) {
                        Ok(score) => {
                            yield Ok((member, score));
                        }
                        Err(e) => {
                            failed = true;
                            yield Err(e);
                            break;
                        }
                    }
                }

                if failed {
                    break;
                }
            }
        }
    }
}

fn parse_score(raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        RedisError::from((ErrorKind::TypeError, "Invalid sorted set score", raw.to_string()))
            .into()
    })
}
