//! Decoded-tile cache.
//!
//! An LRU cache for decoded RGBA tiles, one per open slide, preventing
//! repeated decompression of frequently painted tiles.
//!
//! # Checkout Semantics
//!
//! `get` and `put` both hand back a [`Bytes`] clone of the cached buffer.
//! The clone is the checkout: the painter composites from it and releases
//! it by dropping, so an entry evicted mid-paint stays alive until every
//! outstanding clone is gone. Refcounting replaces any explicit release
//! call.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the budget is exceeded.

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::trace;

/// Default cache budget: 32MB (roughly 128 decoded 256x256 RGBA tiles).
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 32 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for decoded tiles within one slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Pyramid level (0 = highest resolution)
    pub level: usize,

    /// Tile column (0-indexed from left)
    pub col: u32,

    /// Tile row (0-indexed from top)
    pub row: u32,
}

impl TileKey {
    pub fn new(level: usize, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache for decoded tiles with a byte budget.
///
/// Thread-safe; shared across concurrent painters of the same slide.
pub struct TileCache {
    cache: RwLock<LruCache<TileKey, Bytes>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl TileCache {
    /// Create a cache with the default byte budget.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache with the specified byte budget.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap(),
            )),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Get a tile checkout from the cache.
    ///
    /// Returns `Some(checkout)` if the tile is cached, `None` otherwise.
    /// Marks the entry as recently used.
    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check if a tile is in the cache without updating LRU order.
    pub async fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a decoded tile and return a checkout of it.
    ///
    /// Evicts least-recently-used entries until the cache is within its
    /// byte budget. Outstanding checkouts of evicted entries stay valid.
    pub async fn put(&self, key: TileKey, data: Bytes) -> Bytes {
        let checkout = data.clone();
        let data_size = data.len();

        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old_data) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old_data.len());
        }

        cache.put(key, data);
        *current_size += data_size;

        while *current_size > self.max_size {
            if let Some((evicted_key, evicted_data)) = cache.pop_lru() {
                trace!(?evicted_key, bytes = evicted_data.len(), "evicting tile");
                *current_size = current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }

        checkout
    }

    /// Get the current number of cached tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        let current_size = self.current_size.read().await;
        *current_size
    }

    /// Get the byte budget.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
