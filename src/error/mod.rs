//! Error types for filesig.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur while generating a signature.
///
/// The enum is `Clone` because a queue stores the first error it sees and
/// re-delivers it to every later `push` and `pop` on that queue. I/O errors
/// therefore carry the OS error code and a rendered message instead of the
/// non-cloneable [`std::io::Error`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Invalid configuration parameter, detected before the pipeline starts.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// An I/O operation failed.
    #[error("{message} (os error {code})")]
    Io {
        /// The OS error code (`errno`), or 0 if none was reported.
        code: i32,
        /// Human-readable description, including the path when known.
        message: String,
    },

    /// A push was attempted on a queue whose input is already closed.
    #[error("stream is already closed")]
    StreamClosed,

    /// A pushed block exceeded the queue's configured byte capacity.
    #[error("block of {actual} bytes exceeds queue capacity of {max} bytes")]
    BlockTooLarge {
        /// The size of the rejected block.
        actual: usize,
        /// The queue's maximum queued-byte budget.
        max: usize,
    },
}

impl SignatureError {
    /// Wraps an I/O error with context, keeping the OS error code.
    pub fn io(context: impl std::fmt::Display, err: &io::Error) -> Self {
        Self::Io {
            code: err.raw_os_error().unwrap_or(0),
            message: format!("{context}: {err}"),
        }
    }

    /// Wraps a failed file open, naming the path.
    pub fn open(path: &Path, err: &io::Error) -> Self {
        Self::io(format_args!("can't open file {}", path.display()), err)
    }

    /// Returns the OS error code carried by this error, or 0.
    pub fn os_code(&self) -> i32 {
        match self {
            Self::Io { code, .. } => *code,
            _ => 0,
        }
    }
}
