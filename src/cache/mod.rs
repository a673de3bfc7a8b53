//! Rendered-fragment cache.
//!
//! A single [`PageCache`] is built at start-up and shared through the HTTP
//! state. It is time-bounded only: content writes do not invalidate it, so a
//! cached fragment may lag behind the database for up to its ttl.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! max_entries = 256
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::FragmentKey;
pub use store::{METRIC_PAGE_CACHE_EVICT, METRIC_PAGE_CACHE_HIT, METRIC_PAGE_CACHE_MISS, PageCache};
