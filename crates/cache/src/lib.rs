//! # tagengine-cache
//!
//! Two concurrent, budget-bounded caches sitting in front of the
//! Bitmap Store (§4.3) and the Query Planner (§4.5), both with
//! single-flight coalescing of concurrent misses.

mod bitmap_cache;
mod lru;
mod result_cache;

pub use bitmap_cache::{BitmapCache, CacheEntry, CacheStats};
pub use result_cache::ResultCache;
