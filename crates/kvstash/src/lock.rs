//! Distributed lock helpers.
//!
//! Locks are lock-marker keys (`<lock_prefix><key>`) holding a random token.
//! They are what the spinner waits on when an operation runs with
//! `under_locking`.

use std::time::Duration;

use crate::cache::Cache;
use crate::error::ResultExt;
use crate::store::KvStore;
use crate::CacheError;

/// Proof of holding a lock: the marker key and the holder's token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    key: String,
    token: String,
}

impl LockToken {
    /// Create a token for an explicit value.
    pub fn new(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
        }
    }

    /// Generate a random token for `key`.
    pub fn generate(key: impl Into<String>) -> Self {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        use rand::Rng;

        let bytes: [u8; 18] = rand::thread_rng().gen();
        Self::new(key, URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Marker key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Holder token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Mutex primitive backed by marker keys with a TTL.
pub trait Locker: Send + Sync {
    /// Create `name` if absent, expiring after `ttl`.
    ///
    /// Fails with [`CacheError::LockError`] if the lock is already held.
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError>;

    /// Remove the marker if it still holds this token.
    ///
    /// Fails with [`CacheError::LockError`] if the lock expired or was
    /// taken over.
    fn release(&self, token: &LockToken) -> Result<(), CacheError>;
}

impl<L: Locker + ?Sized> Locker for &L {
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError> {
        (**self).obtain(name, ttl)
    }

    fn release(&self, token: &LockToken) -> Result<(), CacheError> {
        (**self).release(token)
    }
}

impl<L: Locker + ?Sized> Locker for std::sync::Arc<L> {
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError> {
        (**self).obtain(name, ttl)
    }

    fn release(&self, token: &LockToken) -> Result<(), CacheError> {
        (**self).release(token)
    }
}

/// A held lock.
///
/// Call [`release`](LockGuard::release) to release it and see the result.
/// Dropping the guard releases it on a best-effort basis; use
/// [`keep`](LockGuard::keep) to leave it held until its TTL.
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard<'a, L: Locker + ?Sized> {
    locker: &'a L,
    token: LockToken,
    done: bool,
}

impl<'a, L: Locker + ?Sized> LockGuard<'a, L> {
    fn new(locker: &'a L, token: LockToken) -> Self {
        Self {
            locker,
            token,
            done: false,
        }
    }

    /// The held token.
    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), CacheError> {
        self.done = true;
        self.locker.release(&self.token)
    }

    /// Leave the lock held until it expires.
    pub fn keep(mut self) -> LockToken {
        self.done = true;
        self.token.clone()
    }
}

impl<L: Locker + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = self.locker.release(&self.token) {
            tracing::debug!(key = self.token.key(), error = %e, "lock already gone on drop");
        }
    }
}

impl<L: Locker + ?Sized> std::fmt::Debug for LockGuard<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("token", &self.token).finish()
    }
}

impl<S: KvStore + Locker> Cache<S> {
    /// Run `critical_section` while holding the lock on `key`.
    ///
    /// The lock expires after `max_ttl` even if never released. If the
    /// critical section fails its error is returned; the lock is released
    /// first unless `lock.hold_on_error` is configured.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// cache.lock("stock:sku42", Duration::from_secs(5), || {
    ///     let stock: i64 = cache.get("stock:sku42", &Options::new())?;
    ///     cache.set("stock:sku42", &(stock - 1), &Options::new())
    /// })?;
    /// ```
    pub fn lock<T, E, F>(&self, key: &str, max_ttl: Duration, critical_section: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CacheError>,
    {
        let guard = self.obtain(key, max_ttl).during("cache.lock#obtain")?;

        match critical_section() {
            Ok(value) => {
                guard.release().during("cache.lock#release")?;
                Ok(value)
            }
            Err(e) => {
                if self.hold_on_error() {
                    let _ = guard.keep();
                } else if let Err(release_err) = guard.release() {
                    tracing::warn!(key, error = %release_err, "failed to release lock after critical section error");
                }
                Err(e)
            }
        }
    }

    /// Obtain the lock on `key` for manual release.
    ///
    /// For holding a lock across several operations.
    pub fn get_lock(&self, key: &str, ttl: Duration) -> Result<LockGuard<'_, S>, CacheError> {
        self.obtain(key, ttl).during("cache.get_lock#obtain")
    }

    fn obtain(&self, key: &str, ttl: Duration) -> Result<LockGuard<'_, S>, CacheError> {
        let token = self.store().obtain(&self.spinner().marker(key), ttl)?;
        Ok(LockGuard::new(self.store(), token))
    }
}
