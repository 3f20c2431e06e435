//! Cache-aside facade over a Key-Value store.

use std::sync::Arc;

use kvstash_observability::CommandSink;

use crate::codec::{self, FromEntry, ToEntry};
use crate::config::CacheConfig;
use crate::entry;
use crate::error::ResultExt;
use crate::options::{FetchOptions, Options};
use crate::spin::Spinner;
use crate::store::{Instrumented, KvStore};
use crate::CacheError;

/// Type-preserving cache over a string-valued store.
///
/// Values are stored as base64 of `"<type-tag>##<payload>"`, so they can be
/// read back either into a concrete type or as a dynamic [`Value`](crate::Value).
///
/// # Example
///
/// ```rust,ignore
/// let cache = Cache::new(MemoryStore::new());
///
/// cache.set("price", &1.2, &Options::new())?;
/// let price: f64 = cache.get("price", &Options::new())?;
///
/// let cart: Option<Cart> = cache.fetch(
///     "cart:user123",
///     Options::new().default_with(|| load_cart("user123")),
/// )?;
/// ```
pub struct Cache<S> {
    store: S,
    spinner: Spinner,
    hold_on_error: bool,
}

impl<S: KvStore> Cache<S> {
    /// Wrap a store with the default config.
    pub fn new(store: S) -> Self {
        Self::with_config(store, &CacheConfig::default())
    }

    /// Wrap a store.
    pub fn with_config(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            spinner: Spinner::from_config(config),
            hold_on_error: config.lock.hold_on_error,
        }
    }

    /// Wrap a store, logging every round-trip to the configured sink.
    ///
    /// Logging starts muted when `log.enabled` is false.
    pub fn instrumented(store: S, config: &CacheConfig) -> Cache<Instrumented<S>> {
        Self::instrumented_with_sink(store, config, config.log.sink())
    }

    /// Wrap a store, logging every round-trip to `sink`.
    pub fn instrumented_with_sink(
        store: S,
        config: &CacheConfig,
        sink: Arc<dyn CommandSink>,
    ) -> Cache<Instrumented<S>> {
        let store = Instrumented::new(store, sink);
        if !config.log.enabled {
            store.mute();
        }
        Cache::with_config(store, config)
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The spin coordinator.
    pub fn spinner(&self) -> &Spinner {
        &self.spinner
    }

    pub(crate) fn hold_on_error(&self) -> bool {
        self.hold_on_error
    }

    pub(crate) fn spin<K: AsRef<str>>(&self, keys: &[K], opts: &Options) -> Result<(), CacheError> {
        self.spinner.spin(&self.store, keys, opts)
    }

    /// Get a value from the cache.
    ///
    /// Fails with [`CacheError::NotFound`] if the key doesn't exist. A stored
    /// value that is not an encoded entry (e.g. a counter) is decoded from
    /// its raw text where `T` allows it. That includes values that happen to
    /// be valid base64 of untagged text: they are read as stored, not as the
    /// decoded text, since plain integers like `1400` are valid base64.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let cart: Cart = cache.get("cart:user123", &Options::new())?;
    /// let any: Value = cache.get("cart:user123", &Options::locked())?;
    /// ```
    pub fn get<T: FromEntry>(&self, key: &str, opts: &Options) -> Result<T, CacheError> {
        self.spin(&[key], opts).during("cache.get")?;

        let stored = self
            .store
            .get(key)
            .during("cache.get")?
            .ok_or_else(|| CacheError::NotFound(key.to_string()).during("cache.get"))?;

        match entry::from_transport(&stored) {
            Some(compressed) => codec::decode(&compressed).during("cache.get"),
            None => T::from_raw(&stored).ok_or_else(|| {
                CacheError::DecodeError(format!("`{key}` does not hold an encoded entry"))
                    .during("cache.get")
            }),
        }
    }

    /// Set a value in the cache.
    ///
    /// The value is encoded before any lock check, so encode failures never
    /// touch the store.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// cache.set("cart:user123", &cart, &Options::new().expires_in(Duration::from_secs(3600)))?;
    /// ```
    pub fn set<V: ToEntry + ?Sized>(&self, key: &str, value: &V, opts: &Options) -> Result<(), CacheError> {
        self.write(key, value, opts).map(|_| ())
    }

    /// Set a value, then decode what was stored into `T`.
    ///
    /// The result is exactly what a later `get::<T>` returns, including
    /// the float widening of tag-only decoding when `T` is `Value`.
    pub fn set_to<V, T>(&self, key: &str, value: &V, opts: &Options) -> Result<T, CacheError>
    where
        V: ToEntry + ?Sized,
        T: FromEntry,
    {
        let compressed = self.write(key, value, opts)?;
        codec::decode(&compressed).during("cache.set")
    }

    fn write<V: ToEntry + ?Sized>(&self, key: &str, value: &V, opts: &Options) -> Result<String, CacheError> {
        let compressed = codec::encode(value).during("cache.set")?;
        self.spin(&[key], opts).during("cache.set")?;
        self.store
            .set(key, &entry::to_transport(&compressed), opts.ttl())
            .during("cache.set")?;
        Ok(compressed)
    }

    /// Read-through access.
    ///
    /// - key present: the decoded value, nothing written
    /// - key absent: `Ok(None)`, unless `force` is set (`NotFound`)
    /// - key absent with a default: the default is stored with the same
    ///   options and returned; producer errors are returned and nothing is
    ///   stored
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let hit: Option<Value> = cache.fetch("key", Options::new())?;
    /// let must: Option<Value> = cache.fetch("key", Options::new().force(true))?;
    /// let cart: Option<Cart> = cache.fetch("key", Options::new().default_with(|| db.load_cart()))?;
    /// ```
    pub fn fetch<'a, T, O>(&self, key: &str, opts: O) -> Result<Option<T>, CacheError>
    where
        T: FromEntry + ToEntry,
        O: Into<FetchOptions<'a, T>>,
    {
        let FetchOptions { options, default } = opts.into();

        match self.get::<T>(key, &options) {
            Ok(value) => return Ok(Some(value)),
            Err(e) if !e.is_not_found() => return Err(e),
            Err(e) if options.force => return Err(e.during("cache.fetch")),
            Err(_) => {}
        }

        let Some(default) = default else {
            return Ok(None);
        };
        let value = default.resolve()?;
        self.set(key, &value, &options)?;
        Ok(Some(value))
    }

    /// Check if a key exists in the cache.
    pub fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let count = self.store.exists(&[key.to_string()]).during("cache.exists")?;
        Ok(count > 0)
    }

    /// Delete keys without checking locks.
    pub fn delete<K: AsRef<str>>(&self, keys: &[K]) -> Result<(), CacheError> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        self.store.del(&keys).during("cache.delete")?;
        Ok(())
    }

    /// Delete keys once none of them is locked.
    pub fn delete_under_spin_lock<K: AsRef<str>>(&self, keys: &[K]) -> Result<(), CacheError> {
        self.spin(keys, &Options::locked())
            .during("cache.delete_under_spin_lock")?;
        self.delete(keys)
    }

    /// Delete every key matching a glob pattern.
    ///
    /// Runs a full `KEYS` scan: cost grows with the whole keyspace, and keys
    /// written during the scan may be missed. Does nothing if no key matches.
    pub fn delete_matched(&self, pattern: &str, opts: &Options) -> Result<(), CacheError> {
        let keys = self.store.keys(pattern).during("cache.delete_matched")?;
        if keys.is_empty() {
            return Ok(());
        }

        self.spin(&keys, opts).during("cache.delete_matched")?;
        self.delete(&keys)
    }
}

/// Helper to build cache keys with namespacing.
///
/// # Example
///
/// ```rust,ignore
/// let key = cache_key!("cart", user_id);
/// // Returns "cart:user123"
/// ```
#[macro_export]
macro_rules! cache_key {
    ($prefix:expr, $($part:expr),+) => {{
        let mut key = String::from($prefix);
        $(
            key.push(':');
            key.push_str(&$part.to_string());
        )+
        key
    }};
}
