//! Shared frame buffers
//!
//! A [`Buffer`] is an immutable, reference-counted block of pixel or sample
//! memory. The only way to write pixels is through a [`FrameBuilder`], which
//! owns its memory exclusively and freezes it into a [`Frame`] when done.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Row alignment for every plane, in bytes
pub const FRAME_ALIGN: usize = 16;

/// Immutable shared memory block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// Byte length of the block
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the block is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the raw bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// True when both handles refer to the same allocation
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        self.data.len() == other.data.len() && self.data.as_ptr() == other.data.as_ptr()
    }
}

/// Exclusively owned, writable memory block
#[derive(Debug)]
pub struct BufferMut {
    data: Vec<u8>,
}

impl BufferMut {
    /// Allocate a zero-filled block, reporting allocation failure as an error
    pub fn zeroed(len: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| Error::ResourceExhausted {
            what: "frame buffer",
            bytes: len,
        })?;
        data.resize(len, 0);
        Ok(Self { data })
    }

    /// Borrow the bytes mutably
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Turn into a shared, immutable [`Buffer`]
    pub fn freeze(self) -> Buffer {
        Buffer {
            data: Bytes::from(self.data),
        }
    }
}

/// Plane selector. Packed formats only have [`Plane::Y`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Luma, or the single interleaved plane of a packed format
    Y,
    /// First chroma plane
    U,
    /// Second chroma plane
    V,
}

/// Placement of one plane inside a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Byte offset of the first row
    pub offset: usize,
    /// Distance between rows in bytes
    pub pitch: usize,
    /// Meaningful bytes per row
    pub row_size: usize,
    /// Number of rows
    pub height: usize,
}

impl PlaneLayout {
    /// Bytes covered by this plane, padding included
    pub fn span(&self) -> usize {
        self.pitch * self.height
    }
}

/// Layout of every plane in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Luma or packed plane
    pub main: PlaneLayout,
    /// Chroma planes, present for planar YUV
    pub chroma: Option<(PlaneLayout, PlaneLayout)>,
}

impl FrameGeometry {
    /// Layout of the given plane, if the format has it
    pub fn plane(&self, plane: Plane) -> Option<&PlaneLayout> {
        match (plane, &self.chroma) {
            (Plane::Y, _) => Some(&self.main),
            (Plane::U, Some((u, _))) => Some(u),
            (Plane::V, Some((_, v))) => Some(v),
            _ => None,
        }
    }

    /// Total buffer size needed for this geometry
    pub fn total_bytes(&self) -> usize {
        let chroma = self.chroma.map_or(0, |(u, v)| u.span() + v.span());
        self.main.span() + chroma
    }

    /// Iterate over the planes present in this geometry
    pub fn planes(&self) -> impl Iterator<Item = (Plane, &PlaneLayout)> {
        [Plane::Y, Plane::U, Plane::V]
            .into_iter()
            .filter_map(move |p| self.plane(p).map(|layout| (p, layout)))
    }
}

/// A finished, shareable video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    buffer: Buffer,
    geometry: FrameGeometry,
}

impl Frame {
    /// Underlying shared buffer
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Plane layout
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// True when both frames share one allocation
    pub fn shares_buffer(&self, other: &Frame) -> bool {
        self.buffer.ptr_eq(&other.buffer)
    }

    /// Bytes of one plane, padding included
    pub fn plane(&self, plane: Plane) -> Option<&[u8]> {
        let layout = self.geometry.plane(plane)?;
        Some(&self.buffer.as_slice()[layout.offset..layout.offset + layout.span()])
    }

    /// Meaningful bytes of row `y` in `plane`
    pub fn row(&self, plane: Plane, y: usize) -> Option<&[u8]> {
        let layout = self.geometry.plane(plane)?;
        if y >= layout.height {
            return None;
        }
        let start = layout.offset + y * layout.pitch;
        Some(&self.buffer.as_slice()[start..start + layout.row_size])
    }
}

/// Writable frame under construction
#[derive(Debug)]
pub struct FrameBuilder {
    buffer: BufferMut,
    geometry: FrameGeometry,
}

impl FrameBuilder {
    /// Allocate a zeroed frame for `geometry`
    pub fn new(geometry: FrameGeometry) -> Result<Self> {
        let buffer = BufferMut::zeroed(geometry.total_bytes())?;
        Ok(Self { buffer, geometry })
    }

    /// Plane layout
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Mutable bytes of one plane, padding included
    pub fn plane_mut(&mut self, plane: Plane) -> Option<&mut [u8]> {
        let layout = *self.geometry.plane(plane)?;
        Some(&mut self.buffer.as_mut_slice()[layout.offset..layout.offset + layout.span()])
    }

    /// Mutable meaningful bytes of row `y` in `plane`
    pub fn row_mut(&mut self, plane: Plane, y: usize) -> Option<&mut [u8]> {
        let layout = *self.geometry.plane(plane)?;
        if y >= layout.height {
            return None;
        }
        let start = layout.offset + y * layout.pitch;
        Some(&mut self.buffer.as_mut_slice()[start..start + layout.row_size])
    }

    /// Publish the frame; no further writes are possible
    pub fn finish(self) -> Frame {
        Frame {
            buffer: self.buffer.freeze(),
            geometry: self.geometry,
        }
    }
}
