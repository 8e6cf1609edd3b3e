//! # framesynth
//!
//! Clip and frame model for a pull-based media frame server.
//!
//! ## Architecture
//! - **Clip**: a graph node; frames and audio are pulled on demand
//! - **Buffer / Frame**: immutable, reference-counted pixel memory
//! - **Hints**: non-binding cache tuning sent down the graph
//! - **MessageClip**: diagnostic output that replaces a failed graph
//!
//! Caching and failure isolation live in the `synthcache` crate.

#![warn(missing_docs)]

mod buffer;
mod clip;
mod diagnostic;
mod error;
mod hints;
mod parser;
mod source;

pub use buffer::{Buffer, BufferMut, Frame, FrameBuilder, FrameGeometry, Plane, PlaneLayout, FRAME_ALIGN};
pub use clip::{AudioInfo, Clip, PClip, PixelType, SampleType, VideoInfo};
pub use diagnostic::{MessageClip, BACKGROUND_COLOR, DEFAULT_INFO, ERROR_TEXT_COLOR};
pub use error::{Error, ErrorKind, Result};
pub use hints::{AudioPolicy, CacheOption, CachePolicy, RequesterId};
pub use parser::{parse_directives, Directive};
pub use source::Synthetic;
