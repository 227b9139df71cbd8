//! Relation view cache.
//!
//! Two derived views are cached per owner: the follower-id list and the
//! subscriber-id list. Reads are read-through, writes invalidate.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "memory"          # or "redis"
//! follower_ttl_seconds = 43200
//! subscriber_ttl_seconds = 43200
//! memory_capacity = 10000
//! ```

pub(crate) mod batch;
mod client;
mod config;
pub(crate) mod inflight;
mod keys;
pub(crate) mod lock;
mod relations;
pub(crate) mod store;

pub use batch::BatchDeleter;
pub use client::{CacheClient, CacheError, Loader};
pub use config::CacheConfig;
pub use inflight::InflightLoads;
pub use keys::{ViewKind, follower_user_ids_key, parse_key, subscriber_user_ids_key};
pub use relations::RelationCache;
pub use store::MemoryCacheClient;
