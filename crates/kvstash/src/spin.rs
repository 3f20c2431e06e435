//! Spin-wait on lock markers.
//!
//! A key is considered locked while `<lock_prefix><key>` exists in the store.
//! Markers are only ever created and removed by a [`Locker`](crate::Locker);
//! the spinner just polls for them.
//!
//! With the default config the wait is unbounded: an abandoned marker with
//! no TTL blocks callers forever. Set `spin.max_wait_ms` to bound it.

use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::options::Options;
use crate::store::KvStore;
use crate::CacheError;

/// Polls lock markers until they clear.
#[derive(Debug, Clone)]
pub struct Spinner {
    lock_prefix: String,
    interval: Duration,
    backoff: f64,
    max_interval: Duration,
    max_wait: Option<Duration>,
}

impl Default for Spinner {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl Spinner {
    /// Build a spinner from config.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            lock_prefix: config.lock_prefix.clone(),
            interval: config.spin.interval(),
            backoff: if config.spin.backoff.is_finite() {
                config.spin.backoff.max(1.0)
            } else {
                1.0
            },
            max_interval: config.spin.max_interval(),
            max_wait: config.spin.max_wait(),
        }
    }

    /// Marker key guarding `key`.
    pub fn marker(&self, key: &str) -> String {
        format!("{}{}", self.lock_prefix, key)
    }

    /// Lock-marker prefix.
    pub fn lock_prefix(&self) -> &str {
        &self.lock_prefix
    }

    /// Block until none of `keys` is locked.
    ///
    /// No-op unless `opts.under_locking` is set. Fails with
    /// [`CacheError::Locked`] right away when `opts.fail_if_locked` is set,
    /// and with [`CacheError::SpinTimeout`] once `max_wait` has passed.
    pub fn spin<S, K>(&self, store: &S, keys: &[K], opts: &Options) -> Result<(), CacheError>
    where
        S: KvStore + ?Sized,
        K: AsRef<str>,
    {
        if !opts.under_locking {
            return Ok(());
        }

        let markers: Vec<String> = keys.iter().map(|k| self.marker(k.as_ref())).collect();
        let started = Instant::now();
        let mut interval = self.interval;

        loop {
            if store.exists(&markers)? == 0 {
                return Ok(());
            }

            if opts.fail_if_locked {
                return Err(CacheError::Locked(join_keys(keys)));
            }

            let waited = started.elapsed();
            if let Some(max_wait) = self.max_wait {
                if waited >= max_wait {
                    return Err(CacheError::SpinTimeout {
                        keys: join_keys(keys),
                        waited,
                    });
                }
            }

            tracing::trace!(keys = %join_keys(keys), ?interval, "waiting for lock");
            std::thread::sleep(interval);
            interval = self.next_interval(interval);
        }
    }

    fn next_interval(&self, interval: Duration) -> Duration {
        Duration::try_from_secs_f64(interval.as_secs_f64() * self.backoff)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

fn join_keys<K: AsRef<str>>(keys: &[K]) -> String {
    keys.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn fast_spinner() -> Spinner {
        let mut config = CacheConfig::default();
        config.spin.interval_ms = 10;
        Spinner::from_config(&config)
    }

    #[test]
    fn test_marker() {
        assert_eq!(Spinner::default().marker("k"), "__lock:k");
    }

    #[test]
    fn test_noop_without_locking() {
        let store = MemoryStore::new();
        store.set("__lock:k", "x", None).unwrap();
        fast_spinner().spin(&store, &["k"], &Options::new()).unwrap();
    }

    #[test]
    fn test_free_keys_pass() {
        let store = MemoryStore::new();
        fast_spinner()
            .spin(&store, &["a", "b"], &Options::locked())
            .unwrap();
    }

    #[test]
    fn test_fail_if_locked() {
        let store = MemoryStore::new();
        store.set("__lock:b", "x", None).unwrap();
        let start = Instant::now();
        let err = fast_spinner()
            .spin(&store, &["a", "b"], &Options::locked().fail_if_locked(true))
            .unwrap_err();
        assert!(matches!(err, CacheError::Locked(ref keys) if keys == "a, b"));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_waits_until_marker_clears() {
        let store = Arc::new(MemoryStore::new());
        store.set("__lock:k", "x", None).unwrap();

        let remover = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                store.del(&["__lock:k".to_string()]).unwrap();
            })
        };

        let start = Instant::now();
        fast_spinner().spin(&*store, &["k"], &Options::locked()).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        remover.join().unwrap();
    }

    #[test]
    fn test_max_wait() {
        let store = MemoryStore::new();
        store.set("__lock:k", "x", None).unwrap();

        let mut config = CacheConfig::default();
        config.spin.interval_ms = 10;
        config.spin.backoff = 2.0;
        config.spin.max_interval_ms = 40;
        config.spin.max_wait_ms = Some(100);
        let spinner = Spinner::from_config(&config);

        let start = Instant::now();
        let err = spinner.spin(&store, &["k"], &Options::locked()).unwrap_err();
        assert!(matches!(err, CacheError::SpinTimeout { .. }));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_custom_prefix() {
        let store = MemoryStore::new();
        store.set("lk:k", "x", None).unwrap();
        let mut config = CacheConfig::default();
        config.lock_prefix = "lk:".into();
        let err = Spinner::from_config(&config)
            .spin(&store, &["k"], &Options::locked().fail_if_locked(true))
            .unwrap_err();
        assert!(err.is_locked());
    }

    #[test]
    fn test_backoff_growth_is_capped() {
        let mut config = CacheConfig::default();
        config.spin.interval_ms = 10;
        config.spin.backoff = 1e300;
        config.spin.max_interval_ms = 50;
        let spinner = Spinner::from_config(&config);
        assert_eq!(spinner.next_interval(Duration::from_millis(100)), Duration::from_millis(50));
        assert_eq!(spinner.next_interval(Duration::MAX), Duration::from_millis(50));
    }

    #[test]
    fn test_unchecked_infinite_backoff_does_not_panic() {
        let store = MemoryStore::new();
        store.set("__lock:k", "x", None).unwrap();

        let mut config = CacheConfig::default();
        config.spin.interval_ms = 5;
        config.spin.backoff = f64::INFINITY;
        config.spin.max_wait_ms = Some(30);
        let err = Spinner::from_config(&config)
            .spin(&store, &["k"], &Options::locked())
            .unwrap_err();
        assert!(matches!(err, CacheError::SpinTimeout { .. }));
    }
}
