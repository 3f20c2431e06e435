//! Redis store for Spin components.

use std::time::Duration;

use spin_sdk::redis::{Connection, RedisParameter, RedisResult};

use super::KvStore;
use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::lock::{LockToken, Locker};
use crate::CacheError;

/// Deletes the lock marker only if it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Store backed by Spin's outbound Redis.
pub struct RedisStore {
    conn: Connection,
}

impl RedisStore {
    /// Connect to a Redis address such as `redis://localhost:6379`.
    pub fn open(address: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(address)
            .map_err(|e| CacheError::OpenError(format!("{address}: {e:?}")))?;
        Ok(Self { conn })
    }

    fn execute(&self, command: &str, args: Vec<RedisParameter>) -> Result<Vec<RedisResult>, CacheError> {
        self.conn
            .execute(command, &args)
            .map_err(|e| CacheError::StoreError(format!("{command}: {e:?}")))
    }

    fn execute_int(&self, command: &str, args: Vec<RedisParameter>) -> Result<i64, CacheError> {
        match self.execute(command, args)?.as_slice() {
            [RedisResult::Int64(n)] => Ok(*n),
            other => Err(unexpected(command, other)),
        }
    }
}

fn text(s: &str) -> RedisParameter {
    RedisParameter::Binary(s.as_bytes().to_vec())
}

fn utf8(bytes: &[u8]) -> Result<String, CacheError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| CacheError::StoreError(format!("non UTF-8 reply: {e}")))
}

fn unexpected(command: &str, reply: &[RedisResult]) -> CacheError {
    CacheError::StoreError(format!("unexpected {command} reply: {reply:?}"))
}

fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

impl KvStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.execute("GET", vec![text(key)])?.as_slice() {
            [] | [RedisResult::Nil] => Ok(None),
            [RedisResult::Binary(bytes)] => utf8(bytes).map(Some),
            [RedisResult::Status(s)] => Ok(Some(s.clone())),
            other => Err(unexpected("GET", other)),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut args = vec![text(key), text(value)];
        if let Some(ttl) = ttl {
            args.push(text("PX"));
            args.push(RedisParameter::Int64(ttl_ms(ttl)));
        }
        self.execute("SET", args)?;
        Ok(())
    }

    fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let n = self.execute_int("DEL", keys.iter().map(|k| text(k)).collect())?;
        Ok(n.max(0) as u64)
    }

    fn exists(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let n = self.execute_int("EXISTS", keys.iter().map(|k| text(k)).collect())?;
        Ok(n.max(0) as u64)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.execute("KEYS", vec![text(pattern)])?
            .iter()
            .filter_map(|reply| match reply {
                RedisResult::Binary(bytes) => Some(utf8(bytes)),
                RedisResult::Status(s) => Some(Ok(s.clone())),
                _ => None,
            })
            .collect()
    }

    fn incr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        self.execute_int("INCRBY", vec![text(key), RedisParameter::Int64(by)])
            .map(Some)
    }

    fn decr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        self.execute_int("DECRBY", vec![text(key), RedisParameter::Int64(by)])
            .map(Some)
    }
}

impl Locker for RedisStore {
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError> {
        let token = LockToken::generate(name);
        let args = vec![
            text(name),
            text(token.token()),
            text("NX"),
            text("PX"),
            RedisParameter::Int64(ttl_ms(ttl)),
        ];
        match self.execute("SET", args)?.as_slice() {
            [RedisResult::Status(_)] | [RedisResult::Binary(_)] => Ok(token),
            [] | [RedisResult::Nil] => Err(CacheError::LockError(format!("lock `{name}` not obtained"))),
            other => Err(unexpected("SET NX", other)),
        }
    }

    fn release(&self, token: &LockToken) -> Result<(), CacheError> {
        let args = vec![
            text(RELEASE_SCRIPT),
            RedisParameter::Int64(1),
            text(token.key()),
            text(token.token()),
        ];
        match self.execute_int("EVAL", args)? {
            1 => Ok(()),
            _ => Err(CacheError::LockError(format!("lock `{}` not held", token.key()))),
        }
    }
}

impl Cache<RedisStore> {
    /// Connect to Redis with the default config.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let cache = Cache::open("redis://localhost:6379")?;
    /// ```
    pub fn open(address: &str) -> Result<Self, CacheError> {
        Ok(Cache::new(RedisStore::open(address)?))
    }

    /// Connect to `config.redis_address`.
    pub fn open_with_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let address = config
            .redis_address
            .as_deref()
            .ok_or_else(|| CacheError::ConfigError("redis_address is not set".to_string()))?;
        Ok(Cache::with_config(RedisStore::open(address)?, config))
    }
}
