//! Framesynth driver - pulls a frame range and its audio through a cached,
//! failure-isolated synthetic graph

mod dump;
mod inject;
mod report;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use framesynth::{
    parse_directives, AudioInfo, PClip, PixelType, RequesterId, SampleType, Synthetic, VideoInfo,
};
use synthcache::FrameServer;
use tracing::{error, info, warn};

use crate::dump::RawSink;
use crate::inject::{FailAt, FailMode};
use crate::report::Report;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PixelArg {
    Rgb32,
    Rgb24,
    Yuy2,
    Yv12,
    Yv16,
    Yv24,
    Y8,
}

impl From<PixelArg> for PixelType {
    fn from(p: PixelArg) -> Self {
        match p {
            PixelArg::Rgb32 => PixelType::Rgb32,
            PixelArg::Rgb24 => PixelType::Rgb24,
            PixelArg::Yuy2 => PixelType::Yuy2,
            PixelArg::Yv12 => PixelType::Yv12,
            PixelArg::Yv16 => PixelType::Yv16,
            PixelArg::Yv24 => PixelType::Yv24,
            PixelArg::Y8 => PixelType::Y8,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SampleArg {
    U8,
    S16,
    S24,
    S32,
    F32,
}

impl From<SampleArg> for SampleType {
    fn from(s: SampleArg) -> Self {
        match s {
            SampleArg::U8 => SampleType::U8,
            SampleArg::S16 => SampleType::S16,
            SampleArg::S24 => SampleType::S24,
            SampleArg::S32 => SampleType::S32,
            SampleArg::F32 => SampleType::F32,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Frame width
    #[arg(long, default_value_t = 640)]
    width: usize,

    /// Frame height
    #[arg(long, default_value_t = 480)]
    height: usize,

    /// Pixel format
    #[arg(long, value_enum, default_value = "yv12")]
    pixel_type: PixelArg,

    /// Frame rate numerator
    #[arg(long, default_value_t = 24)]
    fps_num: u32,

    /// Frame rate denominator
    #[arg(long, default_value_t = 1)]
    fps_den: u32,

    /// Clip length in frames
    #[arg(long, default_value_t = 240)]
    frames: usize,

    /// Mark the clip as field-based
    #[arg(long)]
    field_based: bool,

    /// Audio sample rate (0 disables audio)
    #[arg(long, default_value_t = 48_000)]
    sample_rate: u32,

    /// Audio channels
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Audio sample format
    #[arg(long, value_enum, default_value = "s16")]
    sample_type: SampleArg,

    /// Cache hint directives, e.g. "max_capacity=20; policy=range; radius=4"
    #[arg(long, default_value = "min_capacity=0; max_capacity=0")]
    hints: String,

    /// First frame to pull
    #[arg(short, long, default_value_t = 0)]
    start: usize,

    /// Number of frames to pull (defaults to the rest of the clip)
    #[arg(short, long)]
    count: Option<usize>,

    /// Samples per audio pull
    #[arg(long, default_value_t = 4096)]
    audio_chunk: u64,

    /// Make this frame fail
    #[arg(long)]
    fail_at: Option<usize>,

    /// How the injected frame fails
    #[arg(long, value_enum, default_value = "error")]
    fail_mode: FailMode,

    /// Write packed frames here
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Write interleaved audio here
    #[arg(long)]
    audio_out: Option<PathBuf>,

    /// Write a JSON report here ("-" for stdout)
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn video_info(&self) -> VideoInfo {
        let mut vi = VideoInfo {
            width: self.width,
            height: self.height,
            pixel_type: self.pixel_type.into(),
            fps_numerator: self.fps_num,
            fps_denominator: self.fps_den,
            num_frames: self.frames,
            field_based: self.field_based,
            audio: AudioInfo::NONE,
        };
        if self.sample_rate > 0 && self.channels > 0 {
            vi.audio = AudioInfo {
                sample_rate: self.sample_rate,
                channels: self.channels,
                sample_type: self.sample_type.into(),
                num_samples: 0,
            };
            vi.audio.num_samples = vi.audio_samples_from_frames(self.frames as u64);
        }
        vi
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Starting framesynth driver v{}", env!("CARGO_PKG_VERSION"));

    let vi = args.video_info();
    let fail_at = args.fail_at;
    let fail_mode = args.fail_mode;
    let server = FrameServer::build(move || {
        let mut graph: PClip = Arc::new(Synthetic::new(vi)?);
        if let Some(at) = fail_at {
            graph = Arc::new(FailAt::new(graph, at, fail_mode));
        }
        Ok(graph)
    });

    let directives = parse_directives(&args.hints).context("Invalid --hints")?;
    for d in &directives {
        server
            .configure(d.option, d.value, RequesterId::HOST)
            .with_context(|| format!("Rejected hint {}={}", d.option, d.value))?;
        info!("Hint {} = {}", d.option, d.value);
    }

    let vi = *server.video_info();
    let start = args.start.min(vi.num_frames);
    let end = args
        .count
        .map_or(vi.num_frames, |c| start.saturating_add(c).min(vi.num_frames));
    info!(
        "Pulling frames {}..{} of {} ({}x{} {:?})",
        start, end, vi.num_frames, vi.width, vi.height, vi.pixel_type
    );

    let mut sink = args.out.as_ref().map(RawSink::create).transpose()?;
    let mut served = 0;
    for n in start..end {
        match server.pull_frame(n) {
            Ok(frame) => {
                served += 1;
                if let Some(sink) = sink.as_mut() {
                    sink.write_frame(&frame)?;
                }
            }
            Err(e) => warn!("Frame {} failed: {}", n, e),
        }
    }
    if let Some(sink) = sink {
        sink.finish()?;
    }

    let mut audio_bytes = 0;
    if let Some(path) = &args.audio_out {
        let mut sink = RawSink::create(path)?;
        let first = vi.audio_samples_from_frames(start as u64);
        let last = vi.audio_samples_from_frames(end as u64);
        let chunk = args.audio_chunk.max(1);
        let mut pos = first;
        while pos < last {
            let count = chunk.min(last - pos);
            let samples = server
                .pull_audio(pos, count)
                .with_context(|| format!("Audio pull at sample {} failed", pos))?;
            sink.write_samples(&samples)?;
            pos += count;
        }
        audio_bytes = sink.finish()?;
    }

    if let Some(message) = server.last_error() {
        error!("Graph failed: {}", message);
    }

    if let Some(path) = &args.report {
        let report = Report::collect(&server, end - start, served, audio_bytes);
        let json = serde_json::to_string_pretty(&report)?;
        if path.as_os_str() == "-" {
            println!("{}", json);
        } else {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report {:?}", path))?;
        }
    }

    if server.has_failed() {
        std::process::exit(2);
    }
    Ok(())
}
