//! Raw output files
//!
//! Frames are written plane by plane with the row padding stripped, so a
//! dump of N frames is exactly `N * packed_size` bytes and can be fed to any
//! raw video reader. Audio is written as interleaved little-endian samples.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use framesynth::Frame;
use tracing::info;

/// Size of one frame once row padding is removed
pub fn packed_size(frame: &Frame) -> usize {
    frame
        .geometry()
        .planes()
        .map(|(_, layout)| layout.row_size * layout.height)
        .sum()
}

/// Write the visible bytes of every plane of `frame`
pub fn write_frame<W: Write>(out: &mut W, frame: &Frame) -> std::io::Result<usize> {
    let mut written = 0;
    for (plane, layout) in frame.geometry().planes() {
        for y in 0..layout.height {
            if let Some(row) = frame.row(plane, y) {
                out.write_all(row)?;
                written += row.len();
            }
        }
    }
    Ok(written)
}

/// Buffered output file that counts what went into it
pub struct RawSink {
    path: PathBuf,
    out: BufWriter<File>,
    bytes: u64,
}

impl RawSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file {:?}", path))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            bytes: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let n = write_frame(&mut self.out, frame)
            .with_context(|| format!("Failed to write frame to {:?}", self.path))?;
        debug_assert_eq!(n, packed_size(frame));
        self.bytes += n as u64;
        Ok(())
    }

    pub fn write_samples(&mut self, samples: &[u8]) -> Result<()> {
        self.out
            .write_all(samples)
            .with_context(|| format!("Failed to write audio to {:?}", self.path))?;
        self.bytes += samples.len() as u64;
        Ok(())
    }

    /// Flush and report the byte count
    pub fn finish(mut self) -> Result<u64> {
        self.out
            .flush()
            .with_context(|| format!("Failed to flush {:?}", self.path))?;
        info!("Wrote {} bytes to {:?}", self.bytes, self.path);
        Ok(self.bytes)
    }
}
