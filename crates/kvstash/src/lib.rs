//! Type-preserving cache-aside layer over a remote Key-Value store.
//!
//! Values are written as `"<type-tag>##<payload>"`, base64-encoded, so a
//! reader can get back either the concrete type it asks for or a dynamic
//! [`Value`] carrying the original primitive type. Operations can be made
//! to wait on lock markers (`__lock:<key>`), and a [`Locker`] provides
//! TTL-bounded distributed locks around critical sections.
//!
//! # Example
//!
//! ```rust,ignore
//! use kvstash::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Cart {
//!     items: Vec<String>,
//! }
//! kvstash::cacheable_record!(Cart);
//!
//! let cache = Cache::new(MemoryStore::new());
//!
//! // Store a value
//! cache.set("cart:user123", &cart, &Options::new())?;
//!
//! // Retrieve a value
//! let cart: Cart = cache.get("cart:user123", &Options::new())?;
//!
//! // Read-through with a producer
//! let cart: Option<Cart> = cache.fetch(
//!     "cart:user456",
//!     Options::new().default_with(|| load_cart("user456")),
//! )?;
//!
//! // Delete a value
//! cache.delete(&["cart:user123"])?;
//! ```

mod cache;
mod codec;
mod config;
mod counter;
mod entry;
mod error;
mod json;
mod lock;
mod options;
mod spin;
pub mod store;
mod value;

pub use cache::Cache;
pub use codec::{decode, encode, FromEntry, Shape, ToEntry, TypeName};
pub use config::{CacheConfig, LockConfig, LogConfig, LogTarget, SpinConfig};
pub use entry::{Entry, Primitive, TypeTag, SEPARATOR};
pub use error::{CacheError, ResultExt};
pub use json::json_payload;
pub use lock::{LockGuard, LockToken, Locker};
pub use options::{Fallback, FetchOptions, IntoProduced, Options, Produced};
pub use spin::Spinner;
pub use store::{Instrumented, KvStore, MemoryStore};
#[cfg(target_arch = "wasm32")]
pub use store::RedisStore;
pub use value::Value;

pub use kvstash_observability::{
    CommandLog, CommandSink, LogFormat, MemorySink, StderrSink, TracingSink,
};

/// Transport encoding helpers.
pub mod transport {
    pub use crate::entry::{from_transport, join, to_transport};
}

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{Cache, CacheError, FromEntry, KvStore, MemoryStore, Options, ToEntry, Value};
}
