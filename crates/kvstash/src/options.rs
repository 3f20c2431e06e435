//! Per-operation access options.

use std::time::Duration;

use crate::CacheError;

/// Options attached to a single cache operation.
///
/// # Example
///
/// ```rust,ignore
/// let opts = Options::new().under_locking(true).expires_in(Duration::from_secs(60));
/// cache.set("cart:user123", &cart, &opts)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Wait until no lock marker is held for the key before proceeding.
    pub under_locking: bool,
    /// With `under_locking`, fail immediately instead of waiting.
    pub fail_if_locked: bool,
    /// TTL applied on write. Zero means no expiry.
    pub expires_in: Duration,
    /// Treat a miss in `fetch` as an error.
    pub force: bool,
}

impl Options {
    /// Options with every flag off and no TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that wait for lock markers.
    pub fn locked() -> Self {
        Self::new().under_locking(true)
    }

    /// Set `under_locking`.
    pub fn under_locking(mut self, on: bool) -> Self {
        self.under_locking = on;
        self
    }

    /// Set `fail_if_locked`.
    pub fn fail_if_locked(mut self, on: bool) -> Self {
        self.fail_if_locked = on;
        self
    }

    /// Set the write TTL.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = ttl;
        self
    }

    /// Set `force`.
    pub fn force(mut self, on: bool) -> Self {
        self.force = on;
        self
    }

    /// TTL to hand to the store, `None` for no expiry.
    pub fn ttl(&self) -> Option<Duration> {
        (!self.expires_in.is_zero()).then_some(self.expires_in)
    }

    /// Store `value` on a `fetch` miss.
    pub fn default_value<'a, T>(self, value: T) -> FetchOptions<'a, T> {
        FetchOptions {
            options: self,
            default: Some(Fallback::Value(value)),
        }
    }

    /// Compute the value with `producer` on a `fetch` miss.
    ///
    /// The producer may return any `Result<T, E>` or a [`Produced<T>`].
    /// Errors are returned as-is and nothing is stored.
    pub fn default_with<'a, T, R, F>(self, producer: F) -> FetchOptions<'a, T>
    where
        F: FnOnce() -> R + 'a,
        R: IntoProduced<T> + 'a,
        T: 'a,
    {
        FetchOptions {
            options: self,
            default: Some(Fallback::Producer(Box::new(move || producer().into_produced()))),
        }
    }
}

/// What `fetch` stores on a miss.
pub enum Fallback<'a, T> {
    /// A ready value.
    Value(T),
    /// A zero-argument producer, only invoked on a miss.
    Producer(Box<dyn FnOnce() -> Result<T, CacheError> + 'a>),
}

impl<T> Fallback<'_, T> {
    /// Produce the value to store.
    pub fn resolve(self) -> Result<T, CacheError> {
        match self {
            Fallback::Value(value) => Ok(value),
            Fallback::Producer(producer) => producer(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Fallback<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fallback::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Fallback::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Options for `fetch`: access options plus an optional default.
#[derive(Debug)]
pub struct FetchOptions<'a, T> {
    /// Access options, also used when storing the default.
    pub options: Options,
    /// Value to store on a miss.
    pub default: Option<Fallback<'a, T>>,
}

impl<T> From<Options> for FetchOptions<'_, T> {
    fn from(options: Options) -> Self {
        Self {
            options,
            default: None,
        }
    }
}

/// A computed value that carries its own error, like a query result.
#[derive(Debug)]
pub struct Produced<T> {
    /// The computed value.
    pub data: T,
    /// Set when computing the value failed.
    pub err: Option<anyhow::Error>,
}

impl<T> Produced<T> {
    /// A successful result.
    pub fn ok(data: T) -> Self {
        Self { data, err: None }
    }

    /// A result carrying an error next to its (unused) data.
    pub fn failed(data: T, err: impl Into<anyhow::Error>) -> Self {
        Self {
            data,
            err: Some(err.into()),
        }
    }
}

/// Producer results `fetch` can unwrap.
pub trait IntoProduced<T> {
    /// The value, or the error to return instead of storing anything.
    fn into_produced(self) -> Result<T, CacheError>;
}

impl<T, E: Into<anyhow::Error>> IntoProduced<T> for Result<T, E> {
    fn into_produced(self) -> Result<T, CacheError> {
        self.map_err(|e| CacheError::Producer(e.into()))
    }
}

impl<T> IntoProduced<T> for Produced<T> {
    fn into_produced(self) -> Result<T, CacheError> {
        match self.err {
            Some(err) => Err(CacheError::Producer(err)),
            None => Ok(self.data),
        }
    }
}
