//! Error types for replay encoding and decoding.

use std::io;

use thiserror::Error;

/// Errors that can occur while reading, writing, or analyzing a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An I/O error occurred while reading or writing the file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A read ran past the logical end of the byte stream.
    #[error("end of stream: wanted {wanted} bytes at offset {position}, length {len}")]
    EndOfStream {
        /// Cursor position when the read started.
        position: usize,
        /// Bytes the read needed.
        wanted: usize,
        /// Logical length of the stream.
        len: usize,
    },
    /// The zlib payload could not be inflated.
    #[error("cannot decompress replay payload: {detail}")]
    Decompress {
        /// Description from the inflater.
        detail: String,
    },
    /// The replay was recorded by a different game build.
    #[error("replay was recorded for {found}, expected {expected}")]
    GameMismatch {
        /// Game tag of the running build.
        expected: String,
        /// Game tag stored in the file.
        found: String,
        /// Mission name from the file header.
        mission: String,
    },
    /// A frame could not be decoded.
    #[error("malformed frame: {detail}")]
    MalformedFrame {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The format version is outside the range this build reads.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
}
