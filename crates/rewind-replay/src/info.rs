//! Metadata-only replay inspection.

use std::path::{Path, PathBuf};

use rewind_core::GameFlavor;

use crate::error::ReplayError;
use crate::reader::ReplayReader;

/// Summary of a replay file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayInfo {
    /// Format version.
    pub version: u8,
    /// `ms` of the first frame in the file (the newest), even if that
    /// frame would be skipped on load.
    pub time: i32,
    /// Sum of every frame's `delta_ms`, negative deltas included.
    pub elapsed_time: i64,
    /// Frame count from the header.
    pub frame_count: i32,
    /// Where the file was read from.
    pub replay_path: PathBuf,
    /// Mission name from the header.
    pub replay_mission: String,
}

/// Inspect a replay on disk without building a frame store.
///
/// The game tag is not checked.
pub fn analyze(
    path: impl AsRef<Path>,
    flavor: GameFlavor,
    legacy_limit: usize,
) -> Result<ReplayInfo, ReplayError> {
    let path = path.as_ref();
    let reader = ReplayReader::open(path, flavor, legacy_limit)?;
    summarize(reader, path.to_path_buf())
}

/// Inspect a replay held in memory.
pub fn analyze_bytes(
    bytes: Vec<u8>,
    flavor: GameFlavor,
    legacy_limit: usize,
) -> Result<ReplayInfo, ReplayError> {
    let reader = ReplayReader::from_bytes(bytes, flavor, legacy_limit)?;
    summarize(reader, PathBuf::new())
}

fn summarize(mut reader: ReplayReader, replay_path: PathBuf) -> Result<ReplayInfo, ReplayError> {
    let header = reader.header().clone();
    let mut time = 0;
    let mut elapsed_time = 0i64;
    let mut first = true;
    while let Some(frame) = reader.next_frame()? {
        if first {
            time = frame.ms;
            first = false;
        }
        elapsed_time += i64::from(frame.delta_ms);
    }
    log::debug!(
        "analyzed {}: v{}, {} frames, {elapsed_time} ms",
        replay_path.display(),
        header.version,
        header.frame_count
    );
    Ok(ReplayInfo {
        version: header.version,
        time,
        elapsed_time,
        frame_count: header.frame_count,
        replay_path,
        replay_mission: header.mission,
    })
}
