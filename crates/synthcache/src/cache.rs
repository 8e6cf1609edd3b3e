//! Cache: frame and audio caching in front of a child clip

use std::sync::Arc;

use framesynth::{CacheOption, Clip, Frame, PClip, RequesterId, Result, VideoInfo};

use crate::audio::AudioCache;
use crate::frames::FrameCache;
use crate::stats::{CacheStats, StatsSnapshot};

/// Clip that serves its child's frames and audio through a [`FrameCache`]
/// and an [`AudioCache`]
pub struct Cache {
    /// Producer behind the caches
    child: PClip,

    /// Copy of the child's description, taken at construction
    vi: VideoInfo,

    /// Frames keyed by index, bounded by the merged capacity hints
    frames: FrameCache,

    /// Single sample window refilled at the request start
    audio: AudioCache,

    /// Counters shared by both caches
    stats: Arc<CacheStats>,
}

impl Cache {
    /// Wrap `child` with default hints
    pub fn new(child: PClip) -> Self {
        let vi = *child.video_info();
        let stats = Arc::new(CacheStats::new());
        Self {
            frames: FrameCache::new(stats.clone()),
            audio: AudioCache::new(vi.bytes_per_audio_sample(), vi.audio.num_samples, stats.clone()),
            child,
            vi,
            stats,
        }
    }

    /// Frame cache
    pub fn frames(&self) -> &FrameCache {
        &self.frames
    }

    /// Audio cache
    pub fn audio(&self) -> &AudioCache {
        &self.audio
    }

    /// Copy of the shared counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Copy audio into `buf`
    ///
    /// # Arguments
    /// * `buf` - Destination for `count` interleaved samples
    /// * `start` - First sample
    /// * `count` - Samples requested
    ///
    /// # Returns
    /// Bytes written; samples past the clip end are zeroed
    pub fn read_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<usize> {
        self.audio
            .get_audio(buf, start, count, |b, s, c| self.child.get_audio(b, s, c))
    }
}

impl Clip for Cache {
    fn video_info(&self) -> &VideoInfo {
        &self.vi
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        self.frames.get_frame(n, |n| self.child.get_frame(n))
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        self.read_audio(buf, start, count).map(|_| ())
    }

    fn parity(&self, n: usize) -> bool {
        self.child.parity(n)
    }

    fn set_cache_hints(&self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        if option.is_audio() {
            self.audio.configure(option, value)
        } else {
            self.frames.configure(option, value, requester)
        }
    }

    fn invalidate(&self) {
        self.frames.invalidate();
        self.audio.invalidate();
        self.child.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_info, CountingClip};

    #[test]
    fn test_cache_serves_hits() {
        let child = Arc::new(CountingClip::new(test_info()));
        let cache = Cache::new(child.clone());

        let a = cache.get_frame(2).unwrap();
        let b = cache.get_frame(2).unwrap();
        assert!(a.shares_buffer(&b));
        assert_eq!(child.frame_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_hints_routed_by_option() {
        let child = Arc::new(CountingClip::new(test_info()));
        let cache = Cache::new(child);

        cache
            .set_cache_hints(CacheOption::SetMaxCapacity, 4, RequesterId::HOST)
            .unwrap();
        cache
            .set_cache_hints(CacheOption::SetAudioWindow, 256, RequesterId::HOST)
            .unwrap();
        assert_eq!(cache.frames().effective_max(), 4);
        assert_eq!(cache.audio().max_samples(), 256);
    }

    #[test]
    fn test_invalidate_reaches_child() {
        let child = Arc::new(CountingClip::new(test_info()));
        let cache = Cache::new(child.clone());

        cache.get_frame(0).unwrap();
        cache.invalidate();
        cache.get_frame(0).unwrap();
        assert_eq!(child.frame_calls(), 2);
        assert_eq!(child.invalidations(), 1);
    }

    #[test]
    fn test_audio_through_window() {
        let child = Arc::new(CountingClip::new(test_info()));
        let cache = Cache::new(child.clone());
        let stride = test_info().bytes_per_audio_sample();

        let mut buf = vec![0; 100 * stride];
        cache.get_audio(&mut buf, 0, 100).unwrap();
        cache.get_audio(&mut buf, 10, 50).unwrap();
        assert_eq!(child.audio_calls(), 1);
    }
}
