//! Unified error types for xmlweave
//!
//! Provides a top-level `WeaveError` that wraps module-specific failures,
//! plus `From` impls so `?` works across module boundaries.
//!
//! Resolution misses are deliberately *not* errors: the resolver expresses
//! "no resolution" as `None` and inclusion failures degrade to warnings on
//! the diagnostics channel. Only conditions that abort an operation
//! surface here.

use core::fmt;

/// Top-level error type for xmlweave operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WeaveError {
    /// The underlying parser could not continue with the root document
    FatalParse {
        /// Parser message.
        message: String,
        /// 1-based line in the source, when the position is known.
        line: Option<u64>,
    },
    /// The root source could not be found or opened
    SourceNotFound(String),
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
    /// An encoding label that `encoding_rs` does not know
    UnsupportedEncoding(String),
    /// Contradictory resolver or includer configuration
    Configuration(String),
    /// Expansion was cooperatively stopped from a callback
    Stopped {
        /// Payload supplied by the stopping callback, if any.
        payload: Option<String>,
    },
}

impl fmt::Display for WeaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeaveError::FatalParse { message, line } => match line {
                Some(line) => write!(f, "Fatal parse error at line {}: {}", line, message),
                None => write!(f, "Fatal parse error: {}", message),
            },
            WeaveError::SourceNotFound(what) => write!(f, "Source not found: {}", what),
            WeaveError::Io(msg) => write!(f, "I/O error: {}", msg),
            WeaveError::UnsupportedEncoding(label) => {
                write!(f, "Unsupported encoding: {}", label)
            }
            WeaveError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            WeaveError::Stopped { payload } => match payload {
                Some(payload) => write!(f, "Expansion stopped: {}", payload),
                None => write!(f, "Expansion stopped"),
            },
        }
    }
}

impl std::error::Error for WeaveError {}

impl From<std::io::Error> for WeaveError {
    fn from(err: std::io::Error) -> Self {
        WeaveError::Io(err.to_string())
    }
}
