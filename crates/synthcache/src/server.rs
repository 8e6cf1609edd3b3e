//! FrameServer: one graph instance behind a failure boundary
//!
//! Every pull runs under [`isolate`]. A script error or fault during a pull
//! latches the instance: the output is swapped for a [`MessageClip`] with
//! the same geometry and the failing graph is never called again.

use std::sync::Arc;

use framesynth::{
    CacheOption, Clip, Error, Frame, MessageClip, PClip, RequesterId, Result, VideoInfo,
};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::cache::Cache;
use crate::isolate::isolate;
use crate::stats::StatsSnapshot;

struct State {
    output: PClip,
    failure: Option<String>,
}

/// Top-level graph instance serving frames and audio to one host
///
/// A single lock covers the whole pull, so calls on one instance never
/// overlap; a slow producer stalls every caller.
pub struct FrameServer {
    vi: VideoInfo,
    state: Mutex<State>,
    cache: Option<Arc<Cache>>,
}

impl FrameServer {
    /// Serve `graph` through a fresh [`Cache`]
    ///
    /// # Arguments
    /// * `graph` - Output clip of the graph
    ///
    /// # Returns
    /// A running server, or one latched with a default-geometry diagnostic
    /// when the clip's [`VideoInfo`] does not validate
    pub fn new(graph: PClip) -> Self {
        match graph.video_info().validate() {
            Ok(()) => Self::serve(graph),
            Err(e) => Self::failed(e),
        }
    }

    /// Construct the graph under the failure boundary. If construction
    /// fails the server starts latched with a default-geometry diagnostic.
    pub fn build<F>(construct: F) -> Self
    where
        F: FnOnce() -> Result<PClip>,
    {
        match isolate(construct) {
            Ok(graph) => Self::new(graph),
            Err(e) => Self::failed(e),
        }
    }

    fn serve(graph: PClip) -> Self {
        let cache = Arc::new(Cache::new(graph));
        let vi = *cache.video_info();
        info!(
            width = vi.width,
            height = vi.height,
            frames = vi.num_frames,
            "frame server ready"
        );
        Self {
            vi,
            state: Mutex::new(State {
                output: cache.clone(),
                failure: None,
            }),
            cache: Some(cache),
        }
    }

    fn failed(e: Error) -> Self {
        let message = e.to_string();
        error!(error = %message, "graph construction failed");
        let output = MessageClip::with_default_geometry(message.clone());
        Self {
            vi: *output.video_info(),
            state: Mutex::new(State {
                output: Arc::new(output),
                failure: Some(message),
            }),
            cache: None,
        }
    }

    /// Clip description, fixed for the lifetime of the instance
    pub fn video_info(&self) -> &VideoInfo {
        &self.vi
    }

    /// Pull frame `n`
    ///
    /// # Arguments
    /// * `n` - Frame index, below `video_info().num_frames`
    ///
    /// # Returns
    /// The frame, or the error that produced it. A script error or fault
    /// latches the server; later pulls return diagnostic frames.
    pub fn pull_frame(&self, n: usize) -> Result<Frame> {
        if n >= self.vi.num_frames {
            return Err(Error::FrameOutOfRange {
                index: n,
                len: self.vi.num_frames,
            });
        }
        let mut state = self.state.lock();
        let output = state.output.clone();
        let result = isolate(|| output.get_frame(n));
        self.settle(&mut state, result)
    }

    /// Pull `count` samples starting at `start` into a new buffer
    pub fn pull_audio(&self, start: u64, count: u64) -> Result<Vec<u8>> {
        let bytes = self.audio_bytes(count)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes).map_err(|_| Error::ResourceExhausted {
            what: "audio buffer",
            bytes,
        })?;
        buf.resize(bytes, 0);
        self.pull_audio_into(&mut buf, start, count)?;
        Ok(buf)
    }

    /// Pull `count` samples starting at `start` into `buf`
    ///
    /// # Arguments
    /// * `buf` - Destination, at least `count` samples long
    /// * `start` - First sample
    /// * `count` - Samples to copy
    ///
    /// # Returns
    /// Number of bytes written
    pub fn pull_audio_into(&self, buf: &mut [u8], start: u64, count: u64) -> Result<usize> {
        let bytes = self.audio_bytes(count)?;
        if buf.len() < bytes {
            return Err(Error::configuration(format!(
                "audio buffer holds {} bytes, {} samples need {}",
                buf.len(),
                count,
                bytes
            )));
        }
        let mut state = self.state.lock();
        let output = state.output.clone();
        let out = &mut buf[..bytes];
        let result = isolate(|| output.get_audio(out, start, count));
        self.settle(&mut state, result).map(|_| bytes)
    }

    /// Send a cache hint to the graph
    pub fn configure(&self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        option.check_value(value)?;
        let state = self.state.lock();
        state.output.set_cache_hints(option, value, requester)
    }

    /// Message of the failure that latched this instance, if any
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().failure.clone()
    }

    /// True once a failure has latched the output
    pub fn has_failed(&self) -> bool {
        self.state.lock().failure.is_some()
    }

    /// Field parity of frame `n`. A faulting graph reports `false`.
    pub fn parity(&self, n: usize) -> bool {
        let mut state = self.state.lock();
        let output = state.output.clone();
        let result = isolate(|| Ok(output.parity(n)));
        self.settle(&mut state, result).unwrap_or(false)
    }

    /// True when the clip is field-based
    pub fn is_field_based(&self) -> bool {
        self.vi.field_based
    }

    /// Drop every cached frame and the audio window
    pub fn invalidate(&self) {
        let state = self.state.lock();
        state.output.invalidate();
    }

    /// Cache counters; zero when construction failed
    pub fn stats(&self) -> StatsSnapshot {
        self.cache.as_ref().map(|c| c.stats()).unwrap_or_default()
    }

    /// Cache in front of the graph; `None` when construction failed
    pub fn cache(&self) -> Option<&Cache> {
        self.cache.as_deref()
    }

    fn audio_bytes(&self, count: u64) -> Result<usize> {
        usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(self.vi.bytes_per_audio_sample()))
            .ok_or(Error::ResourceExhausted {
                what: "audio request",
                bytes: usize::MAX,
            })
    }

    fn settle<T>(&self, state: &mut State, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.latches() && state.failure.is_none() {
                let message = e.to_string();
                error!(error = %message, kind = ?e.kind(), "graph failed, switching to diagnostic output");
                state.output = Arc::new(MessageClip::new(message.clone(), &self.vi));
                state.failure = Some(message);
            }
        }
        result
    }
}
