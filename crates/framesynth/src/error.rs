//! Error types for framesynth

/// Result type alias for frame server operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for clip, cache and server operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Domain error raised by a filter or by graph construction
    #[error("script error: {0}")]
    Script(String),

    /// A frame was requested again while it was still being generated
    #[error("cyclic generation: frame {0} was requested while it is being generated")]
    CyclicGeneration(usize),

    /// A frame was requested from one thread while another was generating it
    #[error("frame {0} is being generated by another caller")]
    GenerationInProgress(usize),

    /// A producer faulted (panicked) while generating
    #[error("fault during generation: {0}")]
    Fault(String),

    /// Allocation failure for a buffer, slot or audio window
    #[error("out of memory allocating {what} ({bytes} bytes)")]
    ResourceExhausted {
        /// What was being allocated
        what: &'static str,
        /// Requested size
        bytes: usize,
    },

    /// Invalid cache option or value
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// Hint directive could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Frame index past the end of the clip
    #[error("frame {index} is out of range (clip has {len} frames)")]
    FrameOutOfRange {
        /// Requested index
        index: usize,
        /// Number of frames in the clip
        len: usize,
    },
}

/// Failure classes, used to decide how a failure propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Explicit domain error; latches the graph
    Script,
    /// Trap caught at the pull boundary; latches the graph
    HardwareFault,
    /// Possibly transient allocation failure; reported per call
    ResourceExhaustion,
    /// Rejected `configure` call; reported per call
    Configuration,
    /// Malformed or colliding request such as an out-of-range index; reported per call
    Request,
}

impl Error {
    /// Build a [`Error::Script`] from any message
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Build a [`Error::Configuration`] from any message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Script(_) | Error::CyclicGeneration(_) => ErrorKind::Script,
            Error::Fault(_) => ErrorKind::HardwareFault,
            Error::ResourceExhausted { .. } => ErrorKind::ResourceExhaustion,
            Error::Configuration(_) | Error::Parse(_) => ErrorKind::Configuration,
            Error::FrameOutOfRange { .. } | Error::GenerationInProgress(_) => ErrorKind::Request,
        }
    }

    /// Whether this failure switches the graph output to its diagnostic clip
    pub fn latches(&self) -> bool {
        matches!(self.kind(), ErrorKind::Script | ErrorKind::HardwareFault)
    }
}

impl From<nom::error::Error<&str>> for Error {
    fn from(err: nom::error::Error<&str>) -> Self {
        if err.input.is_empty() {
            Error::Parse("unexpected end of input".to_string())
        } else {
            Error::Parse(format!("unexpected input at '{}'", err.input))
        }
    }
}
