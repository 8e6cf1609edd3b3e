//! Diagnostic output clip
//!
//! [`MessageClip`] stands in for a graph that has failed. It reports the same
//! [`VideoInfo`] as the clip it replaces and renders one fixed frame, a black
//! background with the failure message drawn in red, for every index. Audio
//! is silence.

use parking_lot::Mutex;

use crate::buffer::{Frame, FrameBuilder, Plane};
use crate::clip::{AudioInfo, Clip, PixelType, SampleType, VideoInfo};
use crate::error::Result;

/// Colour of diagnostic text, 0xRRGGBB
pub const ERROR_TEXT_COLOR: u32 = 0xFF3333;

/// Colour behind diagnostic text, 0xRRGGBB
pub const BACKGROUND_COLOR: u32 = 0x000000;

/// Geometry used when no clip was ever built to copy it from
pub const DEFAULT_INFO: VideoInfo = VideoInfo {
    width: 640,
    height: 480,
    pixel_type: PixelType::Rgb32,
    fps_numerator: 24,
    fps_denominator: 1,
    num_frames: 24 * 60 * 60,
    field_based: false,
    audio: AudioInfo::NONE,
};

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 5;

/// Clip that shows a text message on every frame
pub struct MessageClip {
    vi: VideoInfo,
    message: String,
    rendered: Mutex<Option<Frame>>,
}

impl MessageClip {
    /// Message clip shaped like `template`. A template that fails
    /// [`VideoInfo::validate`] is replaced by [`DEFAULT_INFO`].
    pub fn new(message: impl Into<String>, template: &VideoInfo) -> Self {
        let vi = if template.validate().is_ok() {
            *template
        } else {
            DEFAULT_INFO
        };
        Self {
            vi,
            message: message.into(),
            rendered: Mutex::new(None),
        }
    }

    /// Message clip with [`DEFAULT_INFO`] geometry
    pub fn with_default_geometry(message: impl Into<String>) -> Self {
        Self::new(message, &DEFAULT_INFO)
    }

    /// The message shown on every frame
    pub fn message(&self) -> &str {
        &self.message
    }

    fn render(&self) -> Result<Frame> {
        let mut builder = self.vi.new_frame()?;
        let background = Painter::new(self.vi.pixel_type, BACKGROUND_COLOR);
        background.fill(&mut builder);

        let scale = (self.vi.width.min(self.vi.height) / 160).max(1);
        let cell_w = (GLYPH_WIDTH + 1) * scale;
        let cell_h = (GLYPH_HEIGHT + 2) * scale;
        let margin = 2 * scale;
        let columns = self.vi.width.saturating_sub(2 * margin) / cell_w;

        let ink = Painter::new(self.vi.pixel_type, ERROR_TEXT_COLOR);
        for (line_no, line) in wrap(&self.message, columns).iter().enumerate() {
            let top = margin + line_no * cell_h;
            if top + GLYPH_HEIGHT * scale > self.vi.height {
                break;
            }
            for (col, ch) in line.chars().enumerate() {
                let rows = glyph(ch);
                let left = margin + col * cell_w;
                for (gy, bits) in rows.into_iter().enumerate() {
                    for gx in 0..GLYPH_WIDTH {
                        if bits >> (GLYPH_WIDTH - 1 - gx) & 1 == 0 {
                            continue;
                        }
                        for dy in 0..scale {
                            for dx in 0..scale {
                                ink.dot(
                                    &mut builder,
                                    left + gx * scale + dx,
                                    top + gy * scale + dy,
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(builder.finish())
    }
}

impl Clip for MessageClip {
    fn video_info(&self) -> &VideoInfo {
        &self.vi
    }

    fn get_frame(&self, _n: usize) -> Result<Frame> {
        let mut rendered = self.rendered.lock();
        if let Some(frame) = rendered.as_ref() {
            return Ok(frame.clone());
        }
        let frame = self.render()?;
        *rendered = Some(frame.clone());
        Ok(frame)
    }

    fn get_audio(&self, buf: &mut [u8], _start: u64, _count: u64) -> Result<()> {
        let silence = match self.vi.audio.sample_type {
            SampleType::U8 => 0x80,
            _ => 0,
        };
        buf.fill(silence);
        Ok(())
    }
}

/// Writes one colour into any supported pixel layout
struct Painter {
    pixel_type: PixelType,
    bgr: [u8; 3],
    yuv: [u8; 3],
}

impl Painter {
    fn new(pixel_type: PixelType, rgb: u32) -> Self {
        let [_, r, g, b] = rgb.to_be_bytes();
        Self {
            pixel_type,
            bgr: [b, g, r],
            yuv: rgb_to_yuv(r, g, b),
        }
    }

    fn fill(&self, builder: &mut FrameBuilder) {
        let [y, u, v] = self.yuv;
        let height = builder.geometry().main.height;
        for row in 0..height {
            let Some(line) = builder.row_mut(Plane::Y, row) else { break };
            match self.pixel_type {
                PixelType::Rgb32 => {
                    for px in line.chunks_exact_mut(4) {
                        px.copy_from_slice(&[self.bgr[0], self.bgr[1], self.bgr[2], 0xFF]);
                    }
                }
                PixelType::Rgb24 => {
                    for px in line.chunks_exact_mut(3) {
                        px.copy_from_slice(&self.bgr);
                    }
                }
                PixelType::Yuy2 => {
                    for px in line.chunks_exact_mut(4) {
                        px.copy_from_slice(&[y, u, y, v]);
                    }
                }
                _ => line.fill(y),
            }
        }
        for (plane, value) in [(Plane::U, u), (Plane::V, v)] {
            if let Some(bytes) = builder.plane_mut(plane) {
                bytes.fill(value);
            }
        }
    }

    fn dot(&self, builder: &mut FrameBuilder, x: usize, y: usize) {
        let geometry = *builder.geometry();
        let bpp = self.pixel_type.bytes_per_pixel();
        if y >= geometry.main.height || (x + 1) * bpp > geometry.main.row_size {
            return;
        }
        let [luma, u, v] = self.yuv;
        let Some(line) = builder.row_mut(Plane::Y, y) else { return };
        match self.pixel_type {
            PixelType::Rgb32 => line[x * 4..x * 4 + 3].copy_from_slice(&self.bgr),
            PixelType::Rgb24 => line[x * 3..x * 3 + 3].copy_from_slice(&self.bgr),
            PixelType::Yuy2 => {
                let pair = (x & !1) * 2;
                line[x * 2] = luma;
                line[pair + 1] = u;
                line[pair + 3] = v;
            }
            PixelType::Y8 => line[x] = luma,
            PixelType::Yv12 | PixelType::Yv16 | PixelType::Yv24 => {
                line[x] = luma;
                let (sx, sy) = self.pixel_type.subsampling();
                for (plane, value) in [(Plane::U, u), (Plane::V, v)] {
                    if let Some(row) = builder.row_mut(plane, y >> sy) {
                        row[x >> sx] = value;
                    }
                }
            }
        }
    }
}

/// BT.601 studio-range conversion
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    [y, u, v].map(|c| c.clamp(0, 255) as u8)
}

/// Greedy word wrap to `columns` characters; overlong words are split
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if columns == 0 {
        return lines;
    }
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > columns {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(columns);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if current.is_empty() { word.len() } else { current.chars().count() + 1 + word.len() };
            if needed > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        lines.push(current);
    }
    lines
}

/// 3x5 bitmap, one `u8` per row, most significant of the low three bits on the left
fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        ';' => [0b000, 0b010, 0b000, 0b010, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '"' => [0b101, 0b101, 0b000, 0b000, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '[' => [0b110, 0b100, 0b100, 0b100, 0b110],
        ']' => [0b011, 0b001, 0b001, 0b001, 0b011],
        '<' => [0b001, 0b010, 0b100, 0b010, 0b001],
        '>' => [0b100, 0b010, 0b001, 0b010, 0b100],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        _ => [0b111, 0b001, 0b010, 0b000, 0b010],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(pixel_type: PixelType) -> VideoInfo {
        VideoInfo {
            width: 320,
            height: 240,
            pixel_type,
            num_frames: 100,
            audio: AudioInfo {
                sample_rate: 44_100,
                channels: 2,
                sample_type: SampleType::S16,
                num_samples: 44_100,
            },
            ..DEFAULT_INFO
        }
    }

    #[test]
    fn test_matches_template_geometry() {
        let vi = template(PixelType::Yv12);
        let clip = MessageClip::new("boom", &vi);
        assert_eq!(clip.video_info(), &vi);

        let frame = clip.get_frame(0).unwrap();
        assert_eq!(frame.geometry(), &vi.frame_geometry());
    }

    #[test]
    fn test_invalid_template_uses_default_geometry() {
        for pixel_type in [PixelType::Yv12, PixelType::Yuy2] {
            let vi = VideoInfo {
                width: 321,
                ..template(pixel_type)
            };
            let clip = MessageClip::new("odd width", &vi);
            assert_eq!(clip.video_info(), &DEFAULT_INFO);
            assert!(clip.get_frame(0).is_ok());
        }
    }

    #[test]
    fn test_same_frame_for_every_index() {
        let clip = MessageClip::new("script error: bad", &template(PixelType::Rgb32));
        let a = clip.get_frame(0).unwrap();
        let b = clip.get_frame(99).unwrap();
        assert!(a.shares_buffer(&b));
    }

    #[test]
    fn test_rgb_frame_has_text_and_background() {
        let clip = MessageClip::new("ERROR", &template(PixelType::Rgb32));
        let frame = clip.get_frame(0).unwrap();

        let red = [0x33, 0x33, 0xFF, 0xFF];
        let black = [0x00, 0x00, 0x00, 0xFF];
        let mut text = 0;
        let mut background = 0;
        for y in 0..240 {
            for px in frame.row(Plane::Y, y).unwrap().chunks_exact(4) {
                if px == red {
                    text += 1;
                } else if px == black {
                    background += 1;
                }
            }
        }
        assert!(text > 0);
        assert_eq!(text + background, 320 * 240);
    }

    #[test]
    fn test_planar_chroma_painted() {
        let clip = MessageClip::new("E", &template(PixelType::Yv12));
        let frame = clip.get_frame(0).unwrap();
        let [_, u, v] = rgb_to_yuv(0xFF, 0x33, 0x33);

        assert!(frame.plane(Plane::U).unwrap().contains(&u));
        assert!(frame.plane(Plane::V).unwrap().contains(&v));
        assert_eq!(frame.row(Plane::U, 119).unwrap()[159], 128);
    }

    #[test]
    fn test_audio_is_silence() {
        let clip = MessageClip::new("x", &template(PixelType::Rgb32));
        let mut buf = vec![0xAA; 64];
        clip.get_audio(&mut buf, 0, 16).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rgb_to_yuv() {
        assert_eq!(rgb_to_yuv(0, 0, 0), [16, 128, 128]);
        assert_eq!(rgb_to_yuv(255, 255, 255), [235, 128, 128]);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
        assert!(wrap("anything", 0).is_empty());
    }
}
