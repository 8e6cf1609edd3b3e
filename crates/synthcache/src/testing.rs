//! Instrumented clips for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;

use framesynth::{
    AudioInfo, Clip, Error, Frame, PixelType, Result, SampleType, Synthetic, VideoInfo,
};

pub(crate) fn test_info() -> VideoInfo {
    VideoInfo {
        width: 32,
        height: 16,
        pixel_type: PixelType::Yv12,
        fps_numerator: 25,
        fps_denominator: 1,
        num_frames: 20,
        field_based: false,
        audio: AudioInfo {
            sample_rate: 8000,
            channels: 1,
            sample_type: SampleType::S16,
            num_samples: 16_000,
        },
    }
}

/// Synthetic source that counts producer calls
pub(crate) struct CountingClip {
    source: Synthetic,
    frames: AtomicUsize,
    audio: AtomicUsize,
    invalidations: AtomicUsize,
}

impl CountingClip {
    pub(crate) fn new(vi: VideoInfo) -> Self {
        Self {
            source: Synthetic::new(vi).unwrap(),
            frames: AtomicUsize::new(0),
            audio: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn frame_calls(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub(crate) fn audio_calls(&self) -> usize {
        self.audio.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl Clip for CountingClip {
    fn video_info(&self) -> &VideoInfo {
        self.source.video_info()
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        self.source.get_frame(n)
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        self.audio.fetch_add(1, Ordering::SeqCst);
        self.source.get_audio(buf, start, count)
    }

    fn parity(&self, n: usize) -> bool {
        self.source.parity(n)
    }

    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Script,
    Panic,
    Exhausted,
    /// Audio reads covering sample `at` fail with a script error
    Audio,
}

/// Counting source that fails on one frame index or audio sample
pub(crate) struct FailingClip {
    pub(crate) inner: CountingClip,
    at: usize,
    failure: Failure,
}

impl FailingClip {
    pub(crate) fn new(at: usize, failure: Failure) -> Self {
        Self {
            inner: CountingClip::new(test_info()),
            at,
            failure,
        }
    }
}

impl Clip for FailingClip {
    fn video_info(&self) -> &VideoInfo {
        self.inner.video_info()
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        if n != self.at || matches!(self.failure, Failure::Audio) {
            return self.inner.get_frame(n);
        }
        self.inner.frames.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Script => Err(Error::script(format!("frame {} is broken", n))),
            Failure::Exhausted => Err(Error::ResourceExhausted {
                what: "frame buffer",
                bytes: usize::MAX,
            }),
            Failure::Panic | Failure::Audio => panic!("producer crashed on frame {}", n),
        }
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        let at = self.at as u64;
        if matches!(self.failure, Failure::Audio) && start <= at && at < start + count {
            self.inner.audio.fetch_add(1, Ordering::SeqCst);
            return Err(Error::script(format!("audio sample {} is broken", at)));
        }
        self.inner.get_audio(buf, start, count)
    }
}

/// Counting source whose first frame request blocks until [`GatedClip::open`]
pub(crate) struct GatedClip {
    pub(crate) inner: CountingClip,
    armed: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl GatedClip {
    pub(crate) fn new() -> Self {
        Self {
            inner: CountingClip::new(test_info()),
            armed: AtomicBool::new(true),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    /// Block until the gated request is inside `get_frame`
    pub(crate) fn wait_entered(&self) {
        self.entered.wait();
    }

    /// Let the gated request finish
    pub(crate) fn open(&self) {
        self.release.wait();
    }
}

impl Clip for GatedClip {
    fn video_info(&self) -> &VideoInfo {
        self.inner.video_info()
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.get_frame(n)
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        self.inner.get_audio(buf, start, count)
    }
}
