//! Replay encoding.
//!
//! [`ReplayWriter`] serializes a frame list into the container layout:
//!
//! ```text
//! [version u8] [uncompressed size u32] [zlib( frameCount i32, mission, game, frames... )]
//! ```
//!
//! Frames are written newest first. By default the writer targets the
//! current version of its game build; [`ReplayWriter::with_version`]
//! produces any older layout, which the compatibility tests rely on.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rewind_core::{Frame, GameFlavor};

use crate::error::ReplayError;
use crate::schema::encode_frame;
use crate::stream::MemoryStream;
use crate::{MAX_VERSION, MIN_VERSION};

/// Encodes frame lists into replay files.
#[derive(Clone, Debug)]
pub struct ReplayWriter {
    flavor: GameFlavor,
    version: u8,
    mission: String,
}

impl ReplayWriter {
    /// A writer for `flavor`'s current format version.
    pub fn new(flavor: GameFlavor, mission: impl Into<String>) -> Self {
        Self {
            flavor,
            version: flavor.format_version(),
            mission: mission.into(),
        }
    }

    /// Target a specific format version instead.
    pub fn with_version(mut self, version: u8) -> Result<Self, ReplayError> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(ReplayError::UnsupportedVersion { found: version });
        }
        self.version = version;
        Ok(self)
    }

    /// Format version this writer emits.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Build the uncompressed payload. `frames` is oldest first.
    pub fn encode_payload(&self, frames: &[Frame]) -> Result<MemoryStream, ReplayError> {
        let mut m = MemoryStream::new();
        m.write_i32(frames.len() as i32);
        if self.version >= 4 {
            m.write_string(&self.mission);
        }
        if self.version >= 10 {
            m.write_string(self.flavor.tag());
        }
        for frame in frames.iter().rev() {
            encode_frame(&mut m, frame, self.version, self.flavor)?;
        }
        Ok(m)
    }

    /// Build the complete file image. `frames` is oldest first.
    pub fn encode(&self, frames: &[Frame]) -> Result<Vec<u8>, ReplayError> {
        let payload = self.encode_payload(frames)?;
        let mut out = vec![self.version];
        if self.version >= 3 {
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        }
        if self.version >= 2 {
            let mut encoder = ZlibEncoder::new(out, Compression::default());
            encoder.write_all(payload.as_bytes())?;
            out = encoder.finish()?;
            log::info!(
                "compressed replay payload {} -> {} bytes",
                payload.len(),
                out.len()
            );
        } else {
            out.extend_from_slice(payload.as_bytes());
        }
        Ok(out)
    }

    /// Encode and write to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>, frames: &[Frame]) -> Result<(), ReplayError> {
        let path = path.as_ref();
        log::info!("Saving replay to {}, {} frames", path.display(), frames.len());
        let bytes = self.encode(frames)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Layout ──────────────────────────────────────────────────

    #[test]
    fn declared_size_matches_payload() {
        let frames = vec![Frame::with_clock(0, 16), Frame::with_clock(16, 16)];
        let w = ReplayWriter::new(GameFlavor::Mbg, "a.mis");
        let payload_len = w.encode_payload(&frames).unwrap().len();
        let bytes = w.encode(&frames).unwrap();
        assert_eq!(bytes[0], 11);
        let declared = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        assert_eq!(declared as usize, payload_len);
    }

    #[test]
    fn version_one_is_uncompressed() {
        let frames = vec![Frame::with_clock(5, 7)];
        let w = ReplayWriter::new(GameFlavor::Mbg, "ignored")
            .with_version(1)
            .unwrap();
        let bytes = w.encode(&frames).unwrap();
        assert_eq!(bytes[0], 1);
        // count, then the first frame's ms and delta.
        assert_eq!(&bytes[1..5], &1i32.to_le_bytes());
        assert_eq!(&bytes[5..9], &5i32.to_le_bytes());
        assert_eq!(&bytes[9..13], &7i32.to_le_bytes());
    }

    #[test]
    fn rejects_unknown_versions() {
        let w = ReplayWriter::new(GameFlavor::Mbp, "m");
        assert!(w.clone().with_version(0).is_err());
        assert!(w.with_version(13).is_err());
    }

    #[test]
    fn payload_is_newest_first() {
        let frames = vec![Frame::with_clock(1, 1), Frame::with_clock(2, 1)];
        let w = ReplayWriter::new(GameFlavor::Mbp, "m");
        let mut m = w.encode_payload(&frames).unwrap();
        m.seek(0).unwrap();
        assert_eq!(m.read_i32().unwrap(), 2);
        assert_eq!(m.read_string().unwrap(), "m");
        assert_eq!(m.read_string().unwrap(), "MBP");
        assert_eq!(m.read_i32().unwrap(), 2);
    }
}
