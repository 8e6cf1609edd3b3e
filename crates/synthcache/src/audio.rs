//! Audio window cache
//!
//! Holds one contiguous run of samples exactly as the producer delivered
//! them. A request fully inside the run is copied out; anything else throws
//! the run away and refills it anchored at the request start.

use std::sync::Arc;

use framesynth::{AudioPolicy, CacheOption, Error, Result};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::stats::CacheStats;

/// Window capacity in samples when nobody configured one
pub const DEFAULT_AUDIO_WINDOW: u64 = 65_536;

#[derive(Default)]
struct Window {
    data: Vec<u8>,
    start: u64,
    count: u64,
}

impl Window {
    fn contains(&self, start: u64, count: u64) -> bool {
        self.count > 0 && start >= self.start && start + count <= self.start + self.count
    }
}

struct Inner {
    window: Window,
    policy: AudioPolicy,
    max_samples: u64,
}

/// Single-window audio cache
pub struct AudioCache {
    inner: Mutex<Inner>,
    stride: usize,
    total_samples: u64,
    stats: Arc<CacheStats>,
}

impl AudioCache {
    /// Cache for a track of `total_samples` samples of `stride` bytes each
    pub fn new(stride: usize, total_samples: u64, stats: Arc<CacheStats>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                window: Window::default(),
                policy: AudioPolicy::default(),
                max_samples: DEFAULT_AUDIO_WINDOW,
            }),
            stride,
            total_samples,
            stats,
        }
    }

    /// Copy `count` samples from `start` into `buf`, calling `fill` on a
    /// window miss. Samples past the end of the track are zero. Returns the
    /// number of bytes written.
    pub fn get_audio<F>(&self, buf: &mut [u8], start: u64, count: u64, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8], u64, u64) -> Result<()>,
    {
        let bytes = self.byte_len(count)?;
        if buf.len() < bytes {
            return Err(Error::configuration(format!(
                "audio buffer holds {} bytes, {} samples need {}",
                buf.len(),
                count,
                bytes
            )));
        }
        if bytes == 0 {
            return Ok(0);
        }
        let out = &mut buf[..bytes];

        let available = self.total_samples.saturating_sub(start).min(count);
        let valid = available as usize * self.stride;
        out[valid..].fill(0);
        if available == 0 {
            return Ok(bytes);
        }

        let refill = {
            let mut inner = self.inner.lock();
            if inner.policy == AudioPolicy::None || available > inner.max_samples {
                None
            } else if inner.window.contains(start, available) {
                let offset = (start - inner.window.start) as usize * self.stride;
                out[..valid].copy_from_slice(&inner.window.data[offset..offset + valid]);
                self.stats.record_audio_hit();
                trace!(start, count, "audio window hit");
                return Ok(bytes);
            } else {
                let samples = inner.max_samples.min(self.total_samples - start);
                Some((std::mem::take(&mut inner.window), samples))
            }
        };

        let Some((mut window, samples)) = refill else {
            fill(&mut out[..valid], start, available)?;
            return Ok(bytes);
        };

        // The window is detached while the producer runs; a failed refill
        // leaves it empty.
        window.count = 0;
        let len = samples as usize * self.stride;
        window.data.clear();
        window.data.try_reserve_exact(len).map_err(|_| {
            warn!(bytes = len, "cannot allocate audio window");
            Error::ResourceExhausted {
                what: "audio window",
                bytes: len,
            }
        })?;
        window.data.resize(len, 0);
        fill(&mut window.data, start, samples)?;
        window.start = start;
        window.count = samples;
        out[..valid].copy_from_slice(&window.data[..valid]);

        self.stats.record_audio_refill();
        debug!(start, samples, "audio window refilled");
        self.inner.lock().window = window;
        Ok(bytes)
    }

    /// Apply `SET_AUDIO_POLICY` or `SET_AUDIO_WINDOW`
    pub fn configure(&self, option: CacheOption, value: i64) -> Result<()> {
        let checked = option.check_value(value)?;
        let mut inner = self.inner.lock();
        match option {
            CacheOption::SetAudioPolicy => {
                inner.policy = AudioPolicy::from_code(value)?;
                if inner.policy == AudioPolicy::None {
                    inner.window = Window::default();
                }
            }
            CacheOption::SetAudioWindow => inner.max_samples = checked as u64,
            _ => {
                return Err(Error::configuration(format!(
                    "{} is not an audio cache option",
                    option
                )));
            }
        }
        debug!(option = %option, value, "audio cache hint applied");
        Ok(())
    }

    /// Forget the window
    pub fn invalidate(&self) {
        self.inner.lock().window.count = 0;
    }

    /// Samples currently held, with the first sample index
    pub fn window(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.window.start, inner.window.count)
    }

    /// Configured window capacity in samples
    pub fn max_samples(&self) -> u64 {
        self.inner.lock().max_samples
    }

    fn byte_len(&self, count: u64) -> Result<usize> {
        usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(self.stride))
            .ok_or(Error::ResourceExhausted {
                what: "audio request",
                bytes: usize::MAX,
            })
    }
}
