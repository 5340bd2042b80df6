//! Unified error type for the search engine and its CLI front ends.
//!
//! One variant per failure kind surfaced anywhere in the pipeline: I/O,
//! malformed metadata, codec failure, a missing contract precondition
//! (e.g. line-mapping requested on a chunk that has none), a chunk that
//! grew past its size budget, and cooperative cancellation.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metafile {path:?}: {reason}")]
    Format { path: Option<PathBuf>, reason: String },

    #[error("compression failure ({codec}): {reason}")]
    Compression { codec: &'static str, reason: String },

    #[error("contract violation: {reason}")]
    Contract { reason: String },

    #[error("chunk {chunk_index} overflowed its size budget: have {have} bytes, limit {limit}")]
    Overflow {
        chunk_index: u64,
        have: usize,
        limit: usize,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: Some(path.into()),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: Some(path.into()),
            reason: reason.into(),
        }
    }

    pub fn contract(reason: impl Into<String>) -> Self {
        Error::Contract {
            reason: reason.into(),
        }
    }

    pub fn compression(codec: &'static str, reason: impl Into<String>) -> Self {
        Error::Compression {
            codec,
            reason: reason.into(),
        }
    }

    /// Maps this error onto the §6 process exit codes: 1 for argument/usage
    /// errors (callers raise those directly via `clap::Error`, never via
    /// this type), 2 for everything this enum represents.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { path: None, source }
    }
}

impl From<crate::block::compress::Lz4Error> for Error {
    fn from(e: crate::block::compress::Lz4Error) -> Self {
        Error::compression("lz4", format!("{e:?}"))
    }
}

impl From<crate::block::decompress_api::BlockDecompressError> for Error {
    fn from(e: crate::block::decompress_api::BlockDecompressError) -> Self {
        Error::compression("lz4", format!("{e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_always_two() {
        assert_eq!(Error::Cancelled.exit_code(), 2);
        assert_eq!(Error::contract("missing mapping").exit_code(), 2);
    }

    #[test]
    fn io_from_conversion_has_no_path() {
        let io_err = std::io::Error::other("boom");
        let err: Error = io_err.into();
        match err {
            Error::Io { path, .. } => assert!(path.is_none()),
            _ => panic!("expected Io variant"),
        }
    }
}
