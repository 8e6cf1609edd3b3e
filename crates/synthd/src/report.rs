//! End-of-run JSON report

use serde::Serialize;
use synthcache::{FrameServer, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub builds: u64,
    pub audio_hits: u64,
    pub audio_refills: u64,
    pub hit_ratio: f64,
}

impl From<StatsSnapshot> for CacheReport {
    fn from(s: StatsSnapshot) -> Self {
        let total = s.hits + s.misses;
        Self {
            hits: s.hits,
            misses: s.misses,
            evictions: s.evictions,
            builds: s.builds,
            audio_hits: s.audio_hits,
            audio_refills: s.audio_refills,
            hit_ratio: if total == 0 {
                0.0
            } else {
                s.hits as f64 / total as f64
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub frames_requested: usize,
    pub frames_served: usize,
    pub frames_failed: usize,
    pub audio_bytes: u64,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_max_frames: Option<usize>,
    pub cache: CacheReport,
}

impl Report {
    /// Collect server state after a run
    pub fn collect(server: &FrameServer, requested: usize, served: usize, audio_bytes: u64) -> Self {
        Self {
            frames_requested: requested,
            frames_served: served,
            frames_failed: requested - served.min(requested),
            audio_bytes,
            failed: server.has_failed(),
            last_error: server.last_error(),
            effective_max_frames: server.cache().map(|c| c.frames().effective_max()),
            cache: server.stats().into(),
        }
    }
}
