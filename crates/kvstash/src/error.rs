//! Cache error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when using the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to open the store.
    #[error("Failed to open store: {0}")]
    OpenError(String),

    /// Failed to serialize a value into an entry.
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Failed to parse an entry payload for its declared tag.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The entry's tag does not fit the requested destination type.
    #[error("Type mismatch: expected {expected}, found `{found}`")]
    TypeMismatch {
        /// Shape the destination accepts.
        expected: &'static str,
        /// Tag found in the entry.
        found: String,
    },

    /// Failed to perform store operation.
    #[error("Store operation failed: {0}")]
    StoreError(String),

    /// Key not found.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A lock marker is held and the caller asked not to wait.
    #[error("Under locking: {0}")]
    Locked(String),

    /// Waited for lock markers longer than the configured maximum.
    #[error("Gave up waiting for lock on {keys} after {waited:?}")]
    SpinTimeout {
        /// Keys that were still locked.
        keys: String,
        /// Total time spent waiting.
        waited: Duration,
    },

    /// Failed to obtain or release a distributed lock.
    #[error("Lock error: {0}")]
    LockError(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error returned by a caller-supplied default producer.
    #[error(transparent)]
    Producer(#[from] anyhow::Error),

    /// An error annotated with the operation that produced it.
    #[error("{op}: {source}")]
    Operation {
        /// Operation name, e.g. `cache.get`.
        op: &'static str,
        /// Underlying error.
        #[source]
        source: Box<CacheError>,
    },
}

impl CacheError {
    /// The innermost error, skipping operation annotations.
    pub fn root(&self) -> &CacheError {
        match self {
            CacheError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the root cause is a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), CacheError::NotFound(_))
    }

    /// Whether the root cause is a held lock marker.
    pub fn is_locked(&self) -> bool {
        matches!(self.root(), CacheError::Locked(_))
    }

    /// Annotate this error with an operation name.
    pub fn during(self, op: &'static str) -> Self {
        CacheError::Operation {
            op,
            source: Box::new(self),
        }
    }
}

/// Adds operation annotations to cache results.
pub trait ResultExt<T> {
    /// Annotate the error, if any, with an operation name.
    fn during(self, op: &'static str) -> Result<T, CacheError>;
}

impl<T> ResultExt<T> for Result<T, CacheError> {
    fn during(self, op: &'static str) -> Result<T, CacheError> {
        self.map_err(|e| e.during(op))
    }
}
