//! Key-Value store abstraction.
//!
//! The cache only needs a handful of Redis-style commands. `None` from
//! `get`, `incr_by` and `decr_by` is the store's miss signal.

mod instrumented;
mod memory;
#[cfg(target_arch = "wasm32")]
mod redis;

use std::sync::Arc;
use std::time::Duration;

use crate::CacheError;

pub use instrumented::Instrumented;
pub use memory::MemoryStore;
#[cfg(target_arch = "wasm32")]
pub use redis::RedisStore;

/// String-valued store with TTLs, pattern scans and counters.
pub trait KvStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a key, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete keys, returning how many existed.
    fn del(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Count how many of `keys` exist.
    fn exists(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Keys matching a glob pattern (`*`, `?`, `[...]`).
    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Add `by` to an integer key.
    fn incr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError>;

    /// Subtract `by` from an integer key.
    fn decr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError>;
}

macro_rules! forward_store {
    ($($ptr:ty),*) => {
        $(
            impl<S: KvStore + ?Sized> KvStore for $ptr {
                fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
                    (**self).get(key)
                }

                fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
                    (**self).set(key, value, ttl)
                }

                fn del(&self, keys: &[String]) -> Result<u64, CacheError> {
                    (**self).del(keys)
                }

                fn exists(&self, keys: &[String]) -> Result<u64, CacheError> {
                    (**self).exists(keys)
                }

                fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
                    (**self).keys(pattern)
                }

                fn incr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
                    (**self).incr_by(key, by)
                }

                fn decr_by(&self, key: &str, by: i64) -> Result<Option<i64>, CacheError> {
                    (**self).decr_by(key, by)
                }
            }
        )*
    };
}

forward_store!(&S, Arc<S>, Box<S>);

/// Redis-style glob match used by `keys`.
///
/// Supports `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes. Runs in
/// `O(pattern * key)`: on a mismatch only the most recent `*` is retried.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let (p, s) = (pattern.as_bytes(), key.as_bytes());
    let (mut pi, mut si) = (0, 0);
    // Pattern index after the last `*`, and the key index it is retried from.
    let mut star: Option<(usize, usize)> = None;

    while si < s.len() {
        if p.get(pi) == Some(&b'*') {
            pi += 1;
            star = Some((pi, si));
        } else if let Some(next) = step(p, pi, s[si]) {
            pi = next;
            si += 1;
        } else if let Some((after_star, from)) = star {
            pi = after_star;
            si = from + 1;
            star = Some((after_star, si));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&b| b == b'*')
}

/// Match one pattern token at `pi` against `c`, returning the index of the
/// next token.
fn step(p: &[u8], pi: usize, c: u8) -> Option<usize> {
    match *p.get(pi)? {
        b'?' => Some(pi + 1),
        b'[' => match class(&p[pi + 1..], c) {
            Some((matched, after)) => matched.then_some(p.len() - after.len()),
            // Unterminated class: treat `[` literally.
            None => (c == b'[').then_some(pi + 1),
        },
        b'\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        lit => (lit == c).then_some(pi + 1),
    }
}

/// Match `c` against a character class body (after `[`).
/// Returns whether it matched and the pattern after `]`.
fn class(p: &[u8], c: u8) -> Option<(bool, &[u8])> {
    let (negate, mut p) = match p.split_first() {
        Some((b'^', rest)) => (true, rest),
        _ => (false, p),
    };
    let mut matched = false;
    loop {
        match p {
            [] => return None,
            [b']', rest @ ..] => return Some((matched != negate, rest)),
            [b'\\', lit, rest @ ..] => {
                matched |= *lit == c;
                p = rest;
            }
            [lo, b'-', hi, rest @ ..] if *hi != b']' => {
                let (lo, hi) = if lo <= hi { (*lo, *hi) } else { (*hi, *lo) };
                matched |= (lo..=hi).contains(&c);
                p = rest;
            }
            [lit, rest @ ..] => {
                matched |= *lit == c;
                p = rest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_literals_and_wildcards() {
        assert!(glob_match("key1", "key1"));
        assert!(!glob_match("key1", "key12"));
        assert!(glob_match("key*", "key"));
        assert!(glob_match("key*", "key12"));
        assert!(glob_match("*", ""));
        assert!(glob_match("k?y", "key"));
        assert!(!glob_match("k?y", "ky"));
        assert!(glob_match("*:user:*", "cart:user:42"));
        assert!(!glob_match("fetch*", "key1"));
    }

    #[test]
    fn test_glob_classes() {
        assert!(glob_match("h[ae]llo", "hello"));
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[ae]llo", "hillo"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("h[a-b]llo", "hbllo"));
        assert!(!glob_match("h[a-b]llo", "hcllo"));
    }

    #[test]
    fn test_glob_escapes() {
        assert!(glob_match(r"a\*b", "a*b"));
        assert!(!glob_match(r"a\*b", "axb"));
        assert!(glob_match("a[", "a["));
    }

    #[test]
    fn test_glob_many_stars_stays_fast() {
        let key = "a".repeat(5_000);
        let start = std::time::Instant::now();
        assert!(!glob_match("*a*a*a*a*a*a*a*b", &key));
        assert!(glob_match("*a*a*a*a*a*a*a*", &key));
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_glob_star_backtracking() {
        assert!(glob_match("*b*c", "abxbyc"));
        assert!(glob_match("a*[0-9]", "abc7"));
        assert!(!glob_match("a*[0-9]", "abc"));
        assert!(glob_match("**", "anything"));
        assert!(!glob_match("a*", ""));
    }
}
