//! Error taxonomy shared by the engine, the modules and the snapshot builder.

use std::collections::TryReserveError;
use std::fmt;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SysmonError>;

/// Error class, independent of the message carried by [`SysmonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Misuse of an API, such as an empty metric name.
    InvalidArgument,
    /// A read that should have succeeded failed.
    Io,
    /// Malformed configuration value or unreadable source format.
    Parse,
    /// Metric source is not available on this platform or host.
    NotSupported,
    /// Allocation failure. Fatal to the operation in progress.
    OutOfMemory,
    /// Invariant violation, e.g. an empty module registry.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Io => "I/O error",
            ErrorKind::Parse => "parse error",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// Error type for every fallible operation in the crate.
#[derive(Debug, thiserror::Error)]
pub enum SysmonError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SysmonError {
    /// Wraps an I/O error with a short description of what was being read.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SysmonError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        SysmonError::Parse(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        SysmonError::NotSupported(msg.into())
    }

    /// Returns the class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SysmonError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SysmonError::Io { .. } => ErrorKind::Io,
            SysmonError::Parse(_) => ErrorKind::Parse,
            SysmonError::NotSupported(_) => ErrorKind::NotSupported,
            SysmonError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            SysmonError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Fatal errors abort the enclosing poll round or construction.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::OutOfMemory
    }
}

impl From<TryReserveError> for SysmonError {
    fn from(e: TryReserveError) -> Self {
        SysmonError::OutOfMemory(e.to_string())
    }
}
