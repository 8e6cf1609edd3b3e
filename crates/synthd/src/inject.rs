//! Fault injection for exercising the failure boundary from the command line

use clap::ValueEnum;
use framesynth::{CacheOption, Clip, Error, Frame, PClip, RequesterId, Result, VideoInfo};

/// How the injected frame fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailMode {
    /// Return a script error
    Error,
    /// Panic inside the producer
    Panic,
}

/// Passes everything through to `child` except frame `at`
pub struct FailAt {
    child: PClip,
    at: usize,
    mode: FailMode,
}

impl FailAt {
    pub fn new(child: PClip, at: usize, mode: FailMode) -> Self {
        Self { child, at, mode }
    }
}

impl Clip for FailAt {
    fn video_info(&self) -> &VideoInfo {
        self.child.video_info()
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        if n != self.at {
            return self.child.get_frame(n);
        }
        match self.mode {
            FailMode::Error => Err(Error::script(format!("injected failure at frame {}", n))),
            FailMode::Panic => panic!("injected panic at frame {}", n),
        }
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        self.child.get_audio(buf, start, count)
    }

    fn parity(&self, n: usize) -> bool {
        self.child.parity(n)
    }

    fn set_cache_hints(&self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        self.child.set_cache_hints(option, value, requester)
    }

    fn invalidate(&self) {
        self.child.invalidate();
    }
}
