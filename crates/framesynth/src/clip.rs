//! Clip metadata and the producer interface every graph node implements

use std::sync::Arc;

use crate::buffer::{Frame, FrameBuilder, FrameGeometry, PlaneLayout, FRAME_ALIGN};
use crate::error::{Error, Result};
use crate::hints::{CacheOption, RequesterId};

/// Pixel layouts a clip can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// Packed BGRA, 4 bytes per pixel
    Rgb32,
    /// Packed BGR, 3 bytes per pixel
    Rgb24,
    /// Packed YUYV 4:2:2
    Yuy2,
    /// Planar YUV 4:2:0
    Yv12,
    /// Planar YUV 4:2:2
    Yv16,
    /// Planar YUV 4:4:4
    Yv24,
    /// Luma only
    Y8,
}

impl PixelType {
    /// Whether this is an RGB format
    pub fn is_rgb(self) -> bool {
        matches!(self, PixelType::Rgb32 | PixelType::Rgb24)
    }

    /// Whether chroma lives in separate planes
    pub fn is_planar(self) -> bool {
        matches!(self, PixelType::Yv12 | PixelType::Yv16 | PixelType::Yv24)
    }

    /// Bytes per pixel in the main plane
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelType::Rgb32 => 4,
            PixelType::Rgb24 => 3,
            PixelType::Yuy2 => 2,
            PixelType::Yv12 | PixelType::Yv16 | PixelType::Yv24 | PixelType::Y8 => 1,
        }
    }

    /// Horizontal and vertical chroma subsampling as log2 shifts
    pub fn subsampling(self) -> (u32, u32) {
        match self {
            PixelType::Yv12 => (1, 1),
            PixelType::Yv16 | PixelType::Yuy2 => (1, 0),
            _ => (0, 0),
        }
    }
}

/// Audio sample encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit
    S16,
    /// Signed 24-bit
    S24,
    /// Signed 32-bit
    S32,
    /// 32-bit float
    F32,
}

impl SampleType {
    /// Bytes per channel sample
    pub fn bytes(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::S16 => 2,
            SampleType::S24 => 3,
            SampleType::S32 | SampleType::F32 => 4,
        }
    }
}

/// Audio description of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Per-channel encoding
    pub sample_type: SampleType,
    /// Total length in samples
    pub num_samples: u64,
}

impl AudioInfo {
    /// No audio track
    pub const NONE: AudioInfo = AudioInfo {
        sample_rate: 0,
        channels: 0,
        sample_type: SampleType::S16,
        num_samples: 0,
    };
}

/// Everything a consumer can know about a clip without pulling from it.
/// Fixed for the lifetime of the clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Pixel layout
    pub pixel_type: PixelType,
    /// Frame rate numerator
    pub fps_numerator: u32,
    /// Frame rate denominator
    pub fps_denominator: u32,
    /// Number of frames
    pub num_frames: usize,
    /// Frames hold single fields rather than full frames
    pub field_based: bool,
    /// Audio track
    pub audio: AudioInfo,
}

impl VideoInfo {
    /// Whether the clip carries video
    pub fn has_video(&self) -> bool {
        self.num_frames > 0 && self.width > 0 && self.height > 0
    }

    /// Whether the clip carries audio
    pub fn has_audio(&self) -> bool {
        self.audio.num_samples > 0 && self.audio.channels > 0
    }

    /// Bytes per multichannel audio sample
    pub fn bytes_per_audio_sample(&self) -> usize {
        usize::from(self.audio.channels) * self.audio.sample_type.bytes()
    }

    /// Audio samples spanned by `frames` video frames
    pub fn audio_samples_from_frames(&self, frames: u64) -> u64 {
        if self.fps_numerator == 0 {
            return 0;
        }
        let num = u128::from(frames)
            * u128::from(self.audio.sample_rate)
            * u128::from(self.fps_denominator);
        (num / u128::from(self.fps_numerator)) as u64
    }

    /// Reject geometry no frame can be allocated for
    pub fn validate(&self) -> Result<()> {
        if self.num_frames > 0 && (self.width == 0 || self.height == 0) {
            return Err(Error::script(format!(
                "clip has {} frames but a {}x{} frame size",
                self.num_frames, self.width, self.height
            )));
        }
        if self.num_frames > 0 && (self.fps_numerator == 0 || self.fps_denominator == 0) {
            return Err(Error::script("clip has frames but no frame rate"));
        }
        let (sx, sy) = self.pixel_type.subsampling();
        if self.width % (1 << sx) != 0 {
            return Err(Error::script(format!(
                "{:?} requires a width divisible by {}",
                self.pixel_type,
                1 << sx
            )));
        }
        if self.height % (1 << sy) != 0 {
            return Err(Error::script(format!(
                "{:?} requires a height divisible by {}",
                self.pixel_type,
                1 << sy
            )));
        }
        if self.audio.num_samples > 0 && (self.audio.channels == 0 || self.audio.sample_rate == 0) {
            return Err(Error::script("clip has audio samples but no channels or sample rate"));
        }
        Ok(())
    }

    /// Plane layout of every frame of this clip
    pub fn frame_geometry(&self) -> FrameGeometry {
        let row_size = self.width * self.pixel_type.bytes_per_pixel();
        let main = PlaneLayout {
            offset: 0,
            pitch: align_up(row_size, FRAME_ALIGN),
            row_size,
            height: self.height,
        };
        let chroma = self.pixel_type.is_planar().then(|| {
            let (sx, sy) = self.pixel_type.subsampling();
            let row_size = self.width >> sx;
            let pitch = align_up(row_size, FRAME_ALIGN);
            let height = self.height >> sy;
            let u = PlaneLayout { offset: main.span(), pitch, row_size, height };
            let v = PlaneLayout { offset: u.offset + u.span(), ..u };
            (u, v)
        });
        FrameGeometry { main, chroma }
    }

    /// Allocate a blank frame matching this clip
    pub fn new_frame(&self) -> Result<FrameBuilder> {
        FrameBuilder::new(self.frame_geometry())
    }
}

fn align_up(n: usize, align: usize) -> usize {
    n.div_ceil(align) * align
}

/// A node in the processing graph. Every call is a synchronous pull that may
/// recurse into upstream clips.
pub trait Clip: Send + Sync {
    /// Clip description, valid before any pull
    fn video_info(&self) -> &VideoInfo;

    /// Produce frame `n`
    fn get_frame(&self, n: usize) -> Result<Frame>;

    /// Fill `buf` with `count` samples starting at `start`.
    /// `buf` holds exactly `count * bytes_per_audio_sample()` bytes.
    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()>;

    /// Field parity of frame `n`; true for top field first
    fn parity(&self, _n: usize) -> bool {
        false
    }

    /// Receive a cache hint. Clips without a cache accept and ignore it.
    fn set_cache_hints(&self, option: CacheOption, value: i64, requester: RequesterId) -> Result<()> {
        option.check_value(value)?;
        let _ = requester;
        Ok(())
    }

    /// Drop anything derived from upstream state
    fn invalidate(&self) {}
}

/// Shared handle to a graph node
pub type PClip = Arc<dyn Clip>;
