//! Typed errors for every fallible SDDS operation.
//!
//! Each [`SddsError`] belongs to one [`ErrorKind`]. Constructing an error
//! through one of the helper constructors (or converting an [`io::Error`])
//! also records its message on the thread's error stack, so command-line
//! front-ends can print the whole chain with
//! [`print_errors`](crate::error_stack::print_errors) the way SDDS tools
//! always have.
//!
//! ```
//! use sdds::error::{ErrorKind, SddsError};
//! use sdds::error_stack;
//!
//! error_stack::clear_errors();
//! let err = SddsError::schema("column x already exists");
//! assert_eq!(err.kind(), ErrorKind::Schema);
//! assert_eq!(error_stack::error_count(), 1);
//! ```

use crate::error_stack;
use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SddsError>;

/// Coarse error category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed header or page text.
    Parse,
    /// Invalid or conflicting definitions.
    Schema,
    /// Failure reported by the operating system or a compression stream.
    Io,
    /// Call made in the wrong lifecycle state.
    Protocol,
    /// Row, index or dimension out of range.
    Bounds,
    /// Valid request the current stream or mode cannot honour.
    Unsupported,
    /// The file is held by another appender.
    Locked,
    /// The dataset was invalidated by an earlier fatal error.
    Inactive,
}

/// Error type for the SDDS runtime.
#[derive(Error, Debug)]
pub enum SddsError {
    /// Malformed header, namelist or page text.
    #[error("parse error: {0}")]
    Parse(String),

    /// Name collisions, invalid names, type mismatches and edits after the
    /// layout was written.
    #[error("schema error: {0}")]
    Schema(String),

    /// I/O failure with the operation that triggered it.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Lifecycle violation, e.g. setting data before `start_page`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Negative or too-large row index, bad array dimensions.
    #[error("out of bounds: {0}")]
    Bounds(String),

    /// Requested operation is not possible on this stream or mode.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The lock sidecar for the file exists.
    #[error("file is locked: {0}")]
    Locked(String),

    /// The dataset hit a fatal error earlier and can no longer be used.
    #[error("dataset is inactive: {0}")]
    Inactive(String),
}

impl SddsError {
    fn record(self) -> Self {
        error_stack::push_error(self.to_string());
        self
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into()).record()
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into()).record()
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into()).record()
    }

    pub fn bounds(msg: impl Into<String>) -> Self {
        Self::Bounds(msg.into()).record()
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into()).record()
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::Locked(msg.into()).record()
    }

    pub fn inactive(msg: impl Into<String>) -> Self {
        Self::Inactive(msg.into()).record()
    }

    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
        .record()
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Io { .. } => ErrorKind::Io,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Bounds(_) => ErrorKind::Bounds,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Locked(_) => ErrorKind::Locked,
            Self::Inactive(_) => ErrorKind::Inactive,
        }
    }

    /// True when the error came from a short read at end of file.
    #[must_use]
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl From<io::Error> for SddsError {
    fn from(source: io::Error) -> Self {
        Self::io("I/O error", source)
    }
}

/// Attach context to an [`io::Result`], mirroring `anyhow::Context`.
pub trait IoContext<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| SddsError::io(f(), e))
    }
}
