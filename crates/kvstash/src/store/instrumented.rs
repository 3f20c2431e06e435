//! Store wrapper that logs every command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kvstash_observability::{CommandLog, CommandSink};

use super::KvStore;
use crate::lock::{LockToken, Locker};
use crate::CacheError;

/// Logs each round-trip of the wrapped store to a [`CommandSink`].
///
/// Logging can be switched off and on at runtime with [`mute`](Self::mute)
/// and [`unmute`](Self::unmute); commands still run while muted.
pub struct Instrumented<S> {
    inner: S,
    sink: Arc<dyn CommandSink>,
    muted: Arc<AtomicBool>,
}

impl<S> Instrumented<S> {
    /// Wrap `inner`, logging to `sink`.
    pub fn new(inner: S, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            inner,
            sink,
            muted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop logging.
    pub fn mute(&self) {
        self.muted.store(true, Ordering::Relaxed);
    }

    /// Resume logging.
    pub fn unmute(&self) {
        self.muted.store(false, Ordering::Relaxed);
    }

    /// Whether logging is off.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Shared mute switch, for toggling from elsewhere.
    pub fn muted_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.muted)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn timed<T>(&self, command: &str, args: &[String], run: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = run();
        if !self.is_muted() {
            self.sink
                .record(&CommandLog::from_args(command, args, start.elapsed()));
        }
        out
    }
}

fn strings<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn set_args(key: &str, value: &str, ttl: Option<Duration>) -> Vec<String> {
    let mut args = strings([key, value]);
    if let Some(ttl) = ttl {
        args.push("px".to_string());
        args.push(ttl.as_millis().to_string());
    }
    args
}

impl<S: KvStore> KvStore for Instrumented<S> {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.timed("get", &strings([key]), || self.inner.get(key))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.timed("set", &set_args(key, value, ttl), || {
            self.inner.set(key, value, ttl)
        })
    }

    fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.timed("del", keys, || self.inner.del(keys))
    }

    fn exists(&self, keys: &[String]) -> Result<u64, CacheError> {
        self.timed("exists", keys, || self.inner.exists(keys))
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.timed("keys", &strings([pattern]), || self.inner.keys(pattern))
    }

    fn incr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        self.timed("incrby", &strings([key, by.to_string().as_str()]), || {
            self.inner.incr_by(key, by)
        })
    }

    fn decr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
        self.timed("decrby", &strings([key, by.to_string().as_str()]), || {
            self.inner.decr_by(key, by)
        })
    }
}

impl<S: Locker> Locker for Instrumented<S> {
    fn obtain(&self, name: &str, ttl: Duration) -> Result<LockToken, CacheError> {
        let args = strings([name, "nx", "px", ttl.as_millis().to_string().as_str()]);
        self.timed("setnx", &args, || self.inner.obtain(name, ttl))
    }

    fn release(&self, token: &LockToken) -> Result<(), CacheError> {
        self.timed("eval", &strings([token.key()]), || self.inner.release(token))
    }
}
