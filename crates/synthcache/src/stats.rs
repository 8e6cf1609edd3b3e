//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one frame/audio cache pair
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    builds: AtomicU64,
    audio_hits: AtomicU64,
    audio_refills: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames served from a Ready slot
    pub hits: u64,
    /// Frames that had to be produced
    pub misses: u64,
    /// Slots dropped by eviction or invalidation
    pub evictions: u64,
    /// Frames successfully produced and published
    pub builds: u64,
    /// Audio requests served from the window
    pub audio_hits: u64,
    /// Audio window refills
    pub audio_refills: u64,
}

impl CacheStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published frame
    pub fn record_build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an audio request served from the window
    pub fn record_audio_hit(&self) {
        self.audio_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an audio window refill
    pub fn record_audio_refill(&self) {
        self.audio_refills.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get total published frames
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Get audio window hits
    pub fn audio_hits(&self) -> u64 {
        self.audio_hits.load(Ordering::Relaxed)
    }

    /// Get audio window refills
    pub fn audio_refills(&self) -> u64 {
        self.audio_refills.load(Ordering::Relaxed)
    }

    /// Calculate frame hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Copy every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            builds: self.builds(),
            audio_hits: self.audio_hits(),
            audio_refills: self.audio_refills(),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.builds.store(0, Ordering::Relaxed);
        self.audio_hits.store(0, Ordering::Relaxed);
        self.audio_refills.store(0, Ordering::Relaxed);
    }
}
