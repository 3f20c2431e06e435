//! Atomic integer counters.
//!
//! Counters are stored as plain decimal text, not as encoded entries, so
//! the store's native increment commands apply. `get::<i64>` and
//! `get::<Value>` still read them through the raw fallback.

use crate::cache::Cache;
use crate::error::ResultExt;
use crate::options::Options;
use crate::store::KvStore;
use crate::CacheError;

impl<S: KvStore> Cache<S> {
    /// Add `by` to the counter at `key`, returning the new value.
    ///
    /// A missing counter is created holding `by`. The create-on-miss path is
    /// not atomic: two first increments can race and one of them is lost.
    pub fn increase(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        match self.store().incr_by(key, by).during("cache.increase#incr_by")? {
            Some(value) => Ok(value),
            None => {
                self.store()
                    .set(key, &by.to_string(), None)
                    .during("cache.increase#init_set")?;
                Ok(by)
            }
        }
    }

    /// Subtract `by` from the counter at `key`, returning the new value.
    ///
    /// A missing counter is created holding `-by`.
    pub fn decrease(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        match self.store().decr_by(key, by).during("cache.decrease#decr_by")? {
            Some(value) => Ok(value),
            None => {
                let initial = by.checked_neg().ok_or_else(|| {
                    CacheError::StoreError(format!("decrement at `{key}` overflows"))
                        .during("cache.decrease")
                })?;
                self.store()
                    .set(key, &initial.to_string(), None)
                    .during("cache.decrease#init_set")?;
                Ok(initial)
            }
        }
    }

    /// `increase(key, 1)`.
    pub fn increment(&self, key: &str) -> Result<i64, CacheError> {
        self.increase(key, 1)
    }

    /// `decrease(key, 1)`.
    pub fn decrement(&self, key: &str) -> Result<i64, CacheError> {
        self.decrease(key, 1)
    }

    /// [`increase`](Cache::increase) once `key` is not locked.
    pub fn increase_under_spin_lock(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        self.spin(&[key], &Options::locked())
            .during("cache.increase_under_spin_lock")?;
        self.increase(key, by)
    }

    /// [`decrease`](Cache::decrease) once `key` is not locked.
    pub fn decrease_under_spin_lock(&self, key: &str, by: i64) -> Result<i64, CacheError> {
        self.spin(&[key], &Options::locked())
            .during("cache.decrease_under_spin_lock")?;
        self.decrease(key, by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Value;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_increase_creates_then_adds() {
        let cache = Cache::new(MemoryStore::new());
        assert_eq!(cache.increase("n", 5).unwrap(), 5);
        assert_eq!(cache.increase("n", 2).unwrap(), 7);
        assert_eq!(cache.increment("n").unwrap(), 8);
    }

    #[test]
    fn test_decrease_creates_negative() {
        let cache = Cache::new(MemoryStore::new());
        assert_eq!(cache.decrease("n", 3).unwrap(), -3);
        assert_eq!(cache.decrement("n").unwrap(), -4);
        assert_eq!(cache.increase("n", 10).unwrap(), 6);
    }

    #[test]
    fn test_counter_readable_through_get() {
        let cache = Cache::new(MemoryStore::new());
        cache.increase("n", 41).unwrap();
        cache.increment("n").unwrap();
        assert_eq!(cache.get::<i64>("n", &Options::new()).unwrap(), 42);
        assert_eq!(
            cache.get::<Value>("n", &Options::new()).unwrap(),
            Value::String("42".into())
        );
    }

    #[test]
    fn test_increase_on_encoded_value_fails() {
        let cache = Cache::new(MemoryStore::new());
        cache.set("n", &1i64, &Options::new()).unwrap();
        let err = cache.increase("n", 1).unwrap_err();
        assert!(matches!(err.root(), CacheError::StoreError(_)));
        assert!(err.to_string().starts_with("cache.increase#incr_by"));
    }

    #[test]
    fn test_increase_under_spin_lock_waits() {
        let cache = Arc::new(Cache::new(MemoryStore::new()));
        cache.store().set("__lock:n", "held", None).unwrap();

        let remover = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(150));
                cache.delete(&["__lock:n"]).unwrap();
            })
        };

        let start = Instant::now();
        assert_eq!(cache.increase_under_spin_lock("n", 1).unwrap(), 1);
        assert!(start.elapsed() >= Duration::from_millis(150));
        remover.join().unwrap();
    }

    #[test]
    fn test_decrease_under_spin_lock_free_key() {
        let cache = Cache::new(MemoryStore::new());
        cache.increase("n", 10).unwrap();
        assert_eq!(cache.decrease_under_spin_lock("n", 4).unwrap(), 6);
    }
}
