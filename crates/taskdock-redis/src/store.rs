use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::MultiplexedConnection};
use tracing::trace;

use taskdock_core::{IndexedRemoval, IndexedWrite, RegistryStore, StoreError, WriteOutcome};

use crate::{connect, store_error};

/// Descriptor write with index maintenance.
///
/// KEYS[1] = descriptor hash, KEYS[2] = global set.
/// ARGV[1] = member, ARGV[2] = category key prefix, ARGV[3] = '1' when the hash must
/// already exist, ARGV[4] = created_at, ARGV[5] = default category,
/// ARGV[6..] = field/value pairs.
/// Returns -1 when required but missing, else whether the hash existed before.
///
/// Category set keys are derived inside the script, so this needs a single-node server.
const LUA_WRITE: &str = r#"
local existed = redis.call('EXISTS', KEYS[1])
if ARGV[3] == '1' and existed == 0 then
    return -1
end

local old_category = redis.call('HGET', KEYS[1], 'category')
for i = 6, #ARGV, 2 do
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
end
redis.call('HSETNX', KEYS[1], 'created_at', ARGV[4])
redis.call('HSETNX', KEYS[1], 'category', ARGV[5])

local category = redis.call('HGET', KEYS[1], 'category')
if old_category and old_category ~= category then
    redis.call('SREM', ARGV[2] .. old_category, ARGV[1])
end
redis.call('SADD', ARGV[2] .. category, ARGV[1])
redis.call('SADD', KEYS[2], ARGV[1])

return existed
"#;

/// Descriptor removal: category set, global set, hash.
///
/// KEYS[1] = descriptor hash, KEYS[2] = global set.
/// ARGV[1] = member, ARGV[2] = category key prefix.
/// Returns 1 if the hash existed.
const LUA_REMOVE: &str = r#"
local category = redis.call('HGET', KEYS[1], 'category')
if category then
    redis.call('SREM', ARGV[2] .. category, ARGV[1])
end
redis.call('SREM', KEYS[2], ARGV[1])
return redis.call('DEL', KEYS[1])
"#;

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: u64 = 256;

/// Registry store backed by Redis hashes and sets.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to `url` (`redis://[:<password>@]<host>:<port>/<db>`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let conn = connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect to redis: {e}")))?;
        Ok(Self { conn })
    }

    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

/// Escape glob metacharacters so `prefix` matches literally in `SCAN MATCH`.
fn glob_literal(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

#[async_trait]
impl RegistryStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| store_error(e, "PING"))?;
        Ok(())
    }

    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.hgetall(key).await.map_err(|e| store_error(e, key))
    }

    async fn read_set(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(|e| store_error(e, key))
    }

    async fn set_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.scard(key).await.map_err(|e| store_error(e, key))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = glob_literal(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_error(e, prefix))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        trace!(prefix, count = keys.len(), "scanned keys");
        Ok(keys)
    }

    async fn write_indexed(&self, write: IndexedWrite) -> Result<WriteOutcome, StoreError> {
        let script = Script::new(LUA_WRITE);
        let mut invocation = script.key(&write.hash_key);
        invocation
            .key(&write.all_key)
            .arg(&write.member)
            .arg(&write.category_prefix)
            .arg(if write.require_existing { "1" } else { "0" })
            .arg(&write.created_at)
            .arg(&write.default_category);
        for (field, value) in &write.fields {
            invocation.arg(field).arg(value);
        }

        let status: i64 = invocation
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| store_error(e, &write.hash_key))?;
        Ok(match status {
            -1 => WriteOutcome::Missing,
            0 => WriteOutcome::Created,
            _ => WriteOutcome::Updated,
        })
    }

    async fn remove_indexed(&self, removal: IndexedRemoval) -> Result<bool, StoreError> {
        let deleted: i64 = Script::new(LUA_REMOVE)
            .key(&removal.hash_key)
            .key(&removal.all_key)
            .arg(&removal.member)
            .arg(&removal.category_prefix)
            .invoke_async(&mut self.conn.clone())
            .await
            .map_err(|e| store_error(e, &removal.hash_key))?;
        Ok(deleted > 0)
    }
}
