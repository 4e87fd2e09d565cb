//! Error types for xsbind
//!
//! This module defines the hard-failure errors of the compiler and codec.
//! Recoverable schema problems are never surfaced here; they are collected
//! as [`crate::diagnostics::Diagnostic`] records and compilation continues.
//! `Error` is reserved for programmer errors, I/O failures and binary
//! format violations.

use thiserror::Error;

/// Result type alias using the xsbind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// The compiler was invoked without a linker
    #[error("no linker supplied: a compilation needs at least the built-in type system")]
    NoLinker,

    /// A persisted record is malformed or version-incompatible
    #[error("codec error in record '{record}': {reason}")]
    Codec {
        /// The record (handle) being read or written
        record: String,
        /// What went wrong
        reason: String,
    },

    /// A handle could not be resolved against a loaded type system
    #[error("unresolved handle '{0}'")]
    UnresolvedHandle(String),

    /// The type system is marked incomplete and refuses the operation
    #[error("type system '{0}' is incomplete: {1}")]
    Incomplete(String, String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a codec error for a record
    pub fn codec(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Codec {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        let err = Error::codec("index", "wrong magic number");
        let msg = format!("{}", err);
        assert!(msg.contains("index"));
        assert!(msg.contains("wrong magic number"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
