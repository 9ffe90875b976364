//! Replay file format for the rewind engine.
//!
//! Reads every historical version of the `.rwx` replay format and writes
//! the current one for each game build.
//!
//! # Architecture
//!
//! - [`MemoryStream`] is the little-endian byte codec both sides use
//! - [`schema`] holds the single field table that drives encode and decode
//! - [`ReplayReader`] inflates a file and yields frames newest-first
//! - [`ReplayWriter`] encodes and compresses a frame list
//! - [`analyze`] summarizes a file without keeping its frames
//!
//! # Format
//!
//! ```text
//! [VERSION u8] [UNCOMPRESSED SIZE u32 (v3+)] [zlib (v2+):
//!     [FRAME COUNT i32] [MISSION (v4+)] [GAME (v10+)]
//!     [Frame N] [Frame N-1] ... [Frame 1]
//! ]
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod info;
pub mod legacy;
pub mod reader;
pub mod schema;
pub mod stream;
pub mod writer;

pub use error::ReplayError;
pub use info::{analyze, analyze_bytes, ReplayInfo};
pub use reader::{FrameIter, ReplayHeader, ReplayReader};
pub use stream::MemoryStream;
pub use writer::ReplayWriter;

/// Mission name reported for files older than version 4.
pub const NULL_MISSION: &str = "[null]";

/// Inflate limit for files older than version 3, which do not store the
/// uncompressed size.
pub const LEGACY_UNCOMPRESSED_LIMIT: usize = 50 * 1024 * 1024;

/// Oldest format version this crate reads.
///
/// History:
/// - v1: raw payload, text lists
/// - v2: zlib payload
/// - v3: uncompressed size in the container
/// - v4: mission name
/// - v5: trapdoor directions and timers
/// - v6: trapdoor positions
/// - v7: binary vectors replace text lists
/// - v8: teleport delay and destination (MBP)
/// - v9: teleport counter (MBP)
/// - v10: game tag, two scratch integers per frame
/// - v11: rewindable binding states (current MBG)
/// - v12: easter egg state (current MBP)
pub const MIN_VERSION: u8 = 1;

/// Newest format version this crate reads.
pub const MAX_VERSION: u8 = 12;
