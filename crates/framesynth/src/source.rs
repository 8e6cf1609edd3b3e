//! Deterministic synthetic source
//!
//! Frame and sample contents depend only on their position, so the same
//! request always produces the same bytes. Used to drive and test graphs
//! without decoding any media.

use crate::buffer::Frame;
use crate::clip::{Clip, SampleType, VideoInfo};
use crate::error::{Error, Result};

/// Source clip generating a moving gradient and a sawtooth audio pattern
pub struct Synthetic {
    vi: VideoInfo,
    top_field_first: bool,
}

impl Synthetic {
    /// Create a source for `vi`, rejecting impossible geometry
    pub fn new(vi: VideoInfo) -> Result<Self> {
        vi.validate()?;
        Ok(Self {
            vi,
            top_field_first: false,
        })
    }

    /// Set the field order reported by [`Clip::parity`]
    pub fn with_top_field_first(mut self, tff: bool) -> Self {
        self.top_field_first = tff;
        self
    }

    /// Bytes of sample `index`, channel `channel`
    fn write_sample(&self, out: &mut [u8], index: u64, channel: u16) {
        let v = (index as u32)
            .wrapping_mul(31)
            .wrapping_add(u32::from(channel) * 7);
        match self.vi.audio.sample_type {
            SampleType::F32 => {
                let f = (v % 2000) as f32 / 1000.0 - 1.0;
                out.copy_from_slice(&f.to_le_bytes());
            }
            _ => out.copy_from_slice(&v.to_le_bytes()[..out.len()]),
        }
    }
}

impl Clip for Synthetic {
    fn video_info(&self) -> &VideoInfo {
        &self.vi
    }

    fn get_frame(&self, n: usize) -> Result<Frame> {
        if n >= self.vi.num_frames {
            return Err(Error::FrameOutOfRange {
                index: n,
                len: self.vi.num_frames,
            });
        }
        let mut builder = self.vi.new_frame()?;
        let geometry = *builder.geometry();
        for (plane_no, (plane, layout)) in geometry.planes().enumerate() {
            for y in 0..layout.height {
                if let Some(row) = builder.row_mut(plane, y) {
                    for (x, byte) in row.iter_mut().enumerate() {
                        *byte = (x + 2 * y + n + plane_no * 64) as u8;
                    }
                }
            }
        }
        Ok(builder.finish())
    }

    fn get_audio(&self, buf: &mut [u8], start: u64, count: u64) -> Result<()> {
        let width = self.vi.audio.sample_type.bytes();
        let stride = self.vi.bytes_per_audio_sample();
        if stride == 0 {
            return Ok(());
        }
        for (i, sample) in buf.chunks_exact_mut(stride).take(count as usize).enumerate() {
            let index = start + i as u64;
            if index >= self.vi.audio.num_samples {
                sample.fill(0);
                continue;
            }
            for (c, out) in sample.chunks_exact_mut(width).enumerate() {
                self.write_sample(out, index, c as u16);
            }
        }
        Ok(())
    }

    fn parity(&self, n: usize) -> bool {
        if self.vi.field_based {
            (n % 2 == 0) == self.top_field_first
        } else {
            self.top_field_first
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Plane;
    use crate::clip::{AudioInfo, PixelType};

    fn info() -> VideoInfo {
        VideoInfo {
            width: 16,
            height: 8,
            pixel_type: PixelType::Yv12,
            fps_numerator: 30,
            fps_denominator: 1,
            num_frames: 5,
            field_based: false,
            audio: AudioInfo {
                sample_rate: 8000,
                channels: 2,
                sample_type: SampleType::S16,
                num_samples: 100,
            },
        }
    }

    #[test]
    fn test_frames_are_deterministic() {
        let clip = Synthetic::new(info()).unwrap();
        let a = clip.get_frame(3).unwrap();
        let b = clip.get_frame(3).unwrap();
        assert_eq!(a, b);
        assert!(!a.shares_buffer(&b));
        assert_ne!(a, clip.get_frame(2).unwrap());
        assert_eq!(a.row(Plane::Y, 0).unwrap()[0], 3);
    }

    #[test]
    fn test_frame_out_of_range() {
        let clip = Synthetic::new(info()).unwrap();
        assert!(matches!(
            clip.get_frame(5),
            Err(Error::FrameOutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn test_audio_pattern_and_tail() {
        let clip = Synthetic::new(info()).unwrap();
        let mut buf = vec![0xFF; 4 * 4];
        clip.get_audio(&mut buf, 98, 4).unwrap();

        let v = 98u32 * 31;
        assert_eq!(&buf[0..2], &v.to_le_bytes()[..2]);
        let v = 98u32 * 31 + 7;
        assert_eq!(&buf[2..4], &v.to_le_bytes()[..2]);
        assert!(buf[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut vi = info();
        vi.width = 15;
        assert!(matches!(Synthetic::new(vi), Err(Error::Script(_))));
    }

    #[test]
    fn test_parity() {
        let mut vi = info();
        vi.field_based = true;
        let clip = Synthetic::new(vi).unwrap().with_top_field_first(true);
        assert!(clip.parity(0));
        assert!(!clip.parity(1));

        let progressive = Synthetic::new(info()).unwrap();
        assert!(!progressive.parity(0));
    }
}
