//! Cache hint vocabulary
//!
//! Hints are non-binding suggestions a downstream consumer sends to the
//! caches of a graph through `configure(option, value, requester)`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifies who sent a hint, so requests from different consumers can be
/// merged instead of overwriting each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(pub u32);

impl RequesterId {
    /// The host application driving the top-level graph
    pub const HOST: RequesterId = RequesterId(257);
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hint options understood by the caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOption {
    /// Frames the cache must be allowed to keep
    SetMinCapacity,
    /// Frames the cache may keep
    SetMaxCapacity,
    /// Distance from the last requested frame worth keeping under `RANGE`
    SetAccessRadius,
    /// Frame retention policy, see [`CachePolicy`]
    SetPolicy,
    /// Audio retention policy, see [`AudioPolicy`]
    SetAudioPolicy,
    /// Audio window capacity in samples
    SetAudioWindow,
}

impl CacheOption {
    /// All options, in a stable order
    pub const ALL: [CacheOption; 6] = [
        CacheOption::SetMinCapacity,
        CacheOption::SetMaxCapacity,
        CacheOption::SetAccessRadius,
        CacheOption::SetPolicy,
        CacheOption::SetAudioPolicy,
        CacheOption::SetAudioWindow,
    ];

    /// Canonical upper-case name
    pub fn name(self) -> &'static str {
        match self {
            CacheOption::SetMinCapacity => "SET_MIN_CAPACITY",
            CacheOption::SetMaxCapacity => "SET_MAX_CAPACITY",
            CacheOption::SetAccessRadius => "SET_ACCESS_RADIUS",
            CacheOption::SetPolicy => "SET_POLICY",
            CacheOption::SetAudioPolicy => "SET_AUDIO_POLICY",
            CacheOption::SetAudioWindow => "SET_AUDIO_WINDOW",
        }
    }

    /// Short aliases accepted by the directive parser
    fn aliases(self) -> &'static [&'static str] {
        match self {
            CacheOption::SetMinCapacity => &["min_capacity", "min"],
            CacheOption::SetMaxCapacity => &["max_capacity", "max"],
            CacheOption::SetAccessRadius => &["access_radius", "radius"],
            CacheOption::SetPolicy => &["policy"],
            CacheOption::SetAudioPolicy => &["audio_policy", "audio"],
            CacheOption::SetAudioWindow => &["audio_window", "window"],
        }
    }

    /// Whether the option targets the audio cache
    pub fn is_audio(self) -> bool {
        matches!(self, CacheOption::SetAudioPolicy | CacheOption::SetAudioWindow)
    }

    /// Validate `value` for this option and return it as a count
    pub fn check_value(self, value: i64) -> Result<usize> {
        if value < 0 {
            return Err(Error::configuration(format!(
                "{} does not accept negative value {}",
                self.name(),
                value
            )));
        }
        match self {
            CacheOption::SetPolicy => CachePolicy::from_code(value).map(|_| value as usize),
            CacheOption::SetAudioPolicy => AudioPolicy::from_code(value).map(|_| value as usize),
            CacheOption::SetAudioWindow if value == 0 => Err(Error::configuration(
                "SET_AUDIO_WINDOW needs at least one sample",
            )),
            _ => usize::try_from(value).map_err(|_| {
                Error::configuration(format!("{} value {} is too large", self.name(), value))
            }),
        }
    }

    /// Parse a textual value: an integer, or a symbolic policy name
    pub fn parse_value(self, text: &str) -> Result<i64> {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(n);
        }
        match self {
            CacheOption::SetPolicy => text.parse::<CachePolicy>().map(CachePolicy::code),
            CacheOption::SetAudioPolicy => text.parse::<AudioPolicy>().map(AudioPolicy::code),
            _ => Err(Error::configuration(format!(
                "{} expects a number, got '{}'",
                self.name(),
                text
            ))),
        }
    }
}

impl FromStr for CacheOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let bare = lower.strip_prefix("set_").unwrap_or(&lower);
        CacheOption::ALL
            .into_iter()
            .find(|opt| opt.aliases().contains(&bare))
            .ok_or_else(|| Error::configuration(format!("unknown cache option '{}'", s)))
    }
}

impl fmt::Display for CacheOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Keep nothing beyond the minimum capacity
    Nothing,
    /// Keep only frames near the last request
    Range,
    /// Plain least-recently-used retention up to the maximum capacity
    #[default]
    All,
}

impl CachePolicy {
    /// Decode the numeric value of a `SET_POLICY` hint
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(CachePolicy::Nothing),
            1 => Ok(CachePolicy::Range),
            2 => Ok(CachePolicy::All),
            _ => Err(Error::configuration(format!("unknown cache policy {}", code))),
        }
    }

    /// Numeric value for `SET_POLICY`
    pub fn code(self) -> i64 {
        match self {
            CachePolicy::Nothing => 0,
            CachePolicy::Range => 1,
            CachePolicy::All => 2,
        }
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nothing" | "none" => Ok(CachePolicy::Nothing),
            "range" => Ok(CachePolicy::Range),
            "all" | "lru" => Ok(CachePolicy::All),
            _ => Err(Error::configuration(format!("unknown cache policy '{}'", s))),
        }
    }
}

/// Audio retention policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioPolicy {
    /// Pass every request straight to the producer
    None,
    /// Serve requests from a refillable window
    #[default]
    Window,
}

impl AudioPolicy {
    /// Decode the numeric value of a `SET_AUDIO_POLICY` hint
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(AudioPolicy::None),
            1 => Ok(AudioPolicy::Window),
            _ => Err(Error::configuration(format!("unknown audio policy {}", code))),
        }
    }

    /// Numeric value for `SET_AUDIO_POLICY`
    pub fn code(self) -> i64 {
        match self {
            AudioPolicy::None => 0,
            AudioPolicy::Window => 1,
        }
    }
}

impl FromStr for AudioPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(AudioPolicy::None),
            "window" | "on" => Ok(AudioPolicy::Window),
            _ => Err(Error::configuration(format!("unknown audio policy '{}'", s))),
        }
    }
}
