//! In-process store for tests and local development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::{glob_match, KvStore};
use crate::lock::{LockToken, Locker};
use crate::CacheError;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Thread-safe in-memory store with TTLs.
///
/// Counters report a miss on absent keys instead of creating them, so the
/// cache's create-on-miss path is exercised. Also acts as a [`Locker`],
/// writing lock markers into the same keyspace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.live().map(|data| data.len()).unwrap_or(0)
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a key, `None` if absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let data = self.live().ok()?;
        let at = data.get(key)?.expires_at?;
        Some(at.saturating_duration_since(Instant::now()))
    }

    /// Lock the map and drop expired keys.
    fn live(&self) -> Result<MutexGuard<'_, HashMap<String, Slot>>, CacheError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| CacheError::StoreError("memory store poisoned".to_string()))?;
        let now = Instant::now();
        data.retain(|_, slot| slot.is_live(now));
        Ok(data)
    }

    fn add(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError> {
        let mut data = self.live()?;
        let Some(slot) = data.get_mut(key) else {
            return Ok(None);
        };
        let current: i64 = slot
            .value
            .parse()
            .map_err(|_| CacheError::StoreError(format!("value at `{key}` is not an integer")))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::StoreError(format!("increment at `{key}` overflows")))?;
        slot.value = next.to_string();
        Ok(Some(next))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live()?.get(key).map(|slot| slot.value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.live()?.insert(key.to_string(), Slot::new(value, ttl));
        Ok(())
    }

    fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut data = self.live()?;
        Ok(keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count() as u64)
    }

    fn exists(&self, keys: &[String]) -> Result<u64, CacheError> {
        let data = self.live()?;
        Ok(keys.iter().filter(|k| data.contains_key(k.as_str())).count() as u64)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let data = self.live()?;
        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn incr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        self.add(key, by)
    }

    fn decr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        let delta = by
            .checked_neg()
            .ok_or_else(|| CacheError::StoreError(format!("decrement at `{key}` overflows")))?;
        self.add(key, delta)
    }
}

impl Locker for MemoryStore {
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError> {
        let mut data = self.live()?;
        if data.contains_key(name) {
            return Err(CacheError::LockError(format!("lock `{name}` not obtained")));
        }
        let token = LockToken::generate(name);
        data.insert(name.to_string(), Slot::new(token.token(), Some(ttl)));
        Ok(token)
    }

    fn release(&self, token: &LockToken) -> Result<(), CacheError> {
        let mut data = self.live()?;
        let held = data
            .get(token.key())
            .is_some_and(|slot| slot.value == token.token());
        if !held {
            return Err(CacheError::LockError(format!(
                "lock `{}` not held",
                token.key()
            )));
        }
        data.remove(token.key());
        Ok(())
    }
}
