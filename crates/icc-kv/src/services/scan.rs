//! Cursor-driven SCAN family iteration

use futures::Stream;
use redis::aio::ConnectionLike;
use tracing::debug;

use crate::error::Result;

/// Keys requested per SCAN round trip
pub const KEYSPACE_SCAN_COUNT: usize = 100;
/// Elements requested per SSCAN/HSCAN/ZSCAN round trip
pub const COLLECTION_SCAN_COUNT: usize = 10;

/// One of SCAN, SSCAN, HSCAN or ZSCAN with its fixed arguments
#[derive(Debug, Clone)]
pub(crate) struct ScanCommand {
    name: &'static str,
    key: Option<String>,
    pattern: Option<String>,
    count: usize,
}

impl ScanCommand {
    /// SCAN over the whole keyspace
    pub(crate) fn keyspace(pattern: String) -> Self {
        Self {
            name: "SCAN",
            key: None,
            pattern: Some(pattern),
            count: KEYSPACE_SCAN_COUNT,
        }
    }

    /// SSCAN/HSCAN/ZSCAN over a single collection key
    pub(crate) fn collection(name: &'static str, key: String, pattern: Option<&str>) -> Self {
        Self {
            name,
            key: Some(key),
            pattern: pattern.map(str::to_string),
            count: COLLECTION_SCAN_COUNT,
        }
    }

    /// Issue a single step and return the next cursor with the raw reply items
    pub(crate) async fn step<C>(&self, conn: &mut C, cursor: u64) -> Result<(u64, Vec<String>)>
    where
        C: ConnectionLike + Send,
    {
        let mut cmd = redis::cmd(self.name);
        if let Some(key) = &self.key {
            cmd.arg(key);
        }
        cmd.arg(cursor);
        if let Some(pattern) = &self.pattern {
            cmd.arg("MATCH").arg(pattern);
        }
        cmd.arg("COUNT").arg(self.count);

        debug!(
            "KV {} {} cursor={} match={:?}",
            self.name,
            self.key.as_deref().unwrap_or(""),
            cursor,
            self.pattern
        );

        let (next, items): (u64, Vec<String>) = cmd.query_async(conn).await?;
        Ok((next, items))
    }

    /// Stream every page until the server hands back cursor 0
    pub(crate) fn pages<C>(self, mut conn: C) -> impl Stream<Item = Result<Vec<String>>>
    where
        C: ConnectionLike + Send,
    {
        async_stream::stream! {
            let mut cursor = 0u64;

            loop {
                match self.step(&mut conn, cursor).await {
                    Ok((next, items)) => {
                        yield Ok(items);
                        if next == 0 {
                            break;
                        }
                        cursor = next;
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
