//! `introspect(Handle) -> { tag_count, card_count, cache_stats,
//! store_stats }` (§6).

use tagengine_cache::CacheStats;

/// Snapshot of a workspace's size and cache occupancy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Introspection {
    pub tag_count: usize,
    pub card_count: usize,
    pub bitmap_cache_stats: CacheStats,
    pub result_cache_entries: usize,
    pub store_stats: StoreStats,
}

/// Store-side counters, computed by scanning the workspace's tag
/// bitmaps — the [`tagengine_storage::BitmapStore`] trait itself has no
/// aggregate stats call, so `introspect` derives these on demand.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub tag_count: usize,
    pub total_cardinality: u64,
}
