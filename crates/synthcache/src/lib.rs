//! # synthcache
//!
//! Caching and failure isolation for framesynth clip graphs.
//!
//! ## Architecture
//! - **FrameCache**: arena of slots, `BTreeMap` recency index, per-slot
//!   generation state so a frame is never built twice at once
//! - **AudioCache**: one contiguous sample window, refilled on miss
//! - **HintState**: per-requester capacity hints merged conservatively
//! - **FrameServer**: a single graph instance; every pull runs inside an
//!   isolation boundary that latches the output to a diagnostic clip on
//!   the first script error or fault

#![warn(missing_docs)]

mod audio;
mod cache;
mod fpstate;
mod frames;
mod hints;
mod isolate;
mod lru;
mod server;
mod stats;

#[cfg(test)]
mod testing;

pub use audio::{AudioCache, DEFAULT_AUDIO_WINDOW};
pub use cache::Cache;
pub use fpstate::{FpGuard, FpState};
pub use frames::FrameCache;
pub use hints::{HintState, DEFAULT_MAX_CAPACITY};
pub use isolate::isolate;
pub use lru::{CachedFrame, SlotStatus};
pub use server::FrameServer;
pub use stats::{CacheStats, StatsSnapshot};
