//! Replay decoding.
//!
//! [`ReplayReader`] validates and inflates the container on construction,
//! reads the payload header, and then yields frames one at a time in file
//! order (newest first). Filtering and ordering are left to the caller.

use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use rewind_core::{Frame, GameFlavor};

use crate::error::ReplayError;
use crate::schema::decode_frame;
use crate::stream::MemoryStream;
use crate::{MAX_VERSION, MIN_VERSION, NULL_MISSION};

/// Container and payload header of a replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayHeader {
    /// Format version byte.
    pub version: u8,
    /// Uncompressed payload size, stored from version 3. Only caps the
    /// inflate; the payload may turn out shorter.
    pub declared_size: Option<u32>,
    /// Payload bytes actually present after inflating.
    pub payload_size: usize,
    /// Frame count as written. Frames with negative deltas are included.
    pub frame_count: i32,
    /// Mission file, or [`NULL_MISSION`] before version 4.
    pub mission: String,
    /// Game tag, stored from version 10.
    pub game: Option<String>,
}

/// Reads frames from an in-memory replay.
pub struct ReplayReader {
    stream: MemoryStream,
    header: ReplayHeader,
    flavor: GameFlavor,
    frames_read: usize,
}

impl ReplayReader {
    /// Read a replay file from disk.
    ///
    /// `legacy_limit` caps the inflated size of files older than version
    /// 3, which do not record it.
    pub fn open(
        path: impl AsRef<Path>,
        flavor: GameFlavor,
        legacy_limit: usize,
    ) -> Result<Self, ReplayError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes, flavor, legacy_limit)
    }

    /// Parse a replay held in memory.
    pub fn from_bytes(
        bytes: Vec<u8>,
        flavor: GameFlavor,
        legacy_limit: usize,
    ) -> Result<Self, ReplayError> {
        let mut m = MemoryStream::from_bytes(bytes);
        let version = m.read_u8()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(ReplayError::UnsupportedVersion { found: version });
        }
        let declared_size = if version >= 3 {
            Some(m.read_u32()?)
        } else {
            None
        };
        if version >= 2 {
            let limit = declared_size.map_or(legacy_limit, |s| s as usize);
            let compressed = &m.as_bytes()[m.tell()..];
            log::debug!(
                "inflating {} byte replay payload (limit {limit})",
                compressed.len()
            );
            m = MemoryStream::from_bytes(inflate(compressed, limit)?);
            if let Some(size) = declared_size {
                if m.len() != size as usize {
                    log::warn!(
                        "replay payload is {} bytes but the header declares {size}",
                        m.len()
                    );
                }
            }
        }
        let payload_size = m.len() - m.tell();

        let frame_count = m.read_i32()?;
        let mission = if version >= 4 {
            m.read_string()?
        } else {
            NULL_MISSION.to_string()
        };
        let game = if version >= 10 {
            Some(m.read_string()?)
        } else {
            None
        };

        Ok(Self {
            stream: m,
            header: ReplayHeader {
                version,
                declared_size,
                payload_size,
                frame_count,
                mission,
                game,
            },
            flavor,
            frames_read: 0,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &ReplayHeader {
        &self.header
    }

    /// Fail with [`ReplayError::GameMismatch`] if the file names a game
    /// other than `flavor`. Files without a game tag always pass.
    pub fn ensure_game(&self, flavor: GameFlavor) -> Result<(), ReplayError> {
        match &self.header.game {
            Some(found) if found != flavor.tag() => Err(ReplayError::GameMismatch {
                expected: flavor.tag().to_string(),
                found: found.clone(),
                mission: self.header.mission.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` once the header's frame count is reached or the
    /// payload is exhausted, whichever comes first. A frame cut short by
    /// the end of the payload is an error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        let expected = usize::try_from(self.header.frame_count).unwrap_or(0);
        if self.frames_read >= expected || self.stream.is_exhausted() {
            return Ok(None);
        }
        let frame = decode_frame(&mut self.stream, self.header.version, self.flavor)?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Number of frames decoded so far.
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter {
        FrameIter {
            reader: self,
            done: false,
        }
    }
}

/// Iterator adapter over replay frames. Stops after the first error.
pub struct FrameIter {
    reader: ReplayReader,
    done: bool,
}

impl Iterator for FrameIter {
    type Item = Result<Frame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn inflate(compressed: &[u8], limit: usize) -> Result<Vec<u8>, ReplayError> {
    let mut out = Vec::new();
    ZlibDecoder::new(compressed)
        .take(limit as u64)
        .read_to_end(&mut out)
        .map_err(|e| ReplayError::Decompress {
            detail: e.to_string(),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ReplayWriter;
    use crate::LEGACY_UNCOMPRESSED_LIMIT;

    fn frames(n: i32) -> Vec<Frame> {
        (0..n).map(|i| Frame::with_clock(i * 16, 16)).collect()
    }

    fn encode(flavor: GameFlavor, frames: &[Frame]) -> Vec<u8> {
        ReplayWriter::new(flavor, "level.mis").encode(frames).unwrap()
    }

    // ── Header ──────────────────────────────────────────────────

    #[test]
    fn header_fields() {
        let bytes = encode(GameFlavor::Mbp, &frames(3));
        assert_eq!(bytes[0], 12);
        let r = ReplayReader::from_bytes(bytes, GameFlavor::Mbp, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        let h = r.header();
        assert_eq!(h.version, 12);
        assert_eq!(h.frame_count, 3);
        assert_eq!(h.mission, "level.mis");
        assert_eq!(h.game.as_deref(), Some("MBP"));
        assert!(h.declared_size.is_some());
    }

    #[test]
    fn game_mismatch_carries_mission() {
        let bytes = encode(GameFlavor::Mbg, &frames(1));
        let r = ReplayReader::from_bytes(bytes, GameFlavor::Mbp, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        match r.ensure_game(GameFlavor::Mbp) {
            Err(ReplayError::GameMismatch {
                expected,
                found,
                mission,
            }) => {
                assert_eq!(expected, "MBP");
                assert_eq!(found, "MBG");
                assert_eq!(mission, "level.mis");
            }
            other => panic!("expected GameMismatch, got {other:?}"),
        }
    }

    #[test]
    fn declared_size_only_caps_the_payload() {
        let mut bytes = encode(GameFlavor::Mbp, &frames(3));
        let declared = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        bytes[1..5].copy_from_slice(&(declared + 1000).to_le_bytes());

        let r = ReplayReader::from_bytes(bytes, GameFlavor::Mbp, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        assert_eq!(r.header().declared_size, Some(declared + 1000));
        assert_eq!(r.header().payload_size, declared as usize);
        assert_eq!(r.frames().count(), 3);
    }

    #[test]
    fn undersized_declaration_truncates_the_payload() {
        let mut bytes = encode(GameFlavor::Mbp, &frames(3));
        let declared = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        bytes[1..5].copy_from_slice(&(declared - 4).to_le_bytes());

        let r = ReplayReader::from_bytes(bytes, GameFlavor::Mbp, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        assert_eq!(r.header().payload_size, declared as usize - 4);
        let decoded: Vec<_> = r.frames().collect();
        assert!(decoded.last().unwrap().is_err());
    }

    #[test]
    fn unsupported_versions() {
        for v in [0u8, 13, 200] {
            let err = ReplayReader::from_bytes(vec![v, 0, 0, 0, 0], GameFlavor::Mbp, 64)
                .err()
                .unwrap();
            assert!(matches!(err, ReplayError::UnsupportedVersion { found } if found == v));
        }
    }

    #[test]
    fn empty_file_is_end_of_stream() {
        let err = ReplayReader::from_bytes(Vec::new(), GameFlavor::Mbp, 64)
            .err()
            .unwrap();
        assert!(matches!(err, ReplayError::EndOfStream { .. }));
    }

    #[test]
    fn garbage_payload_fails_to_inflate() {
        let bytes = vec![12, 10, 0, 0, 0, 1, 2, 3, 4, 5];
        let err = ReplayReader::from_bytes(bytes, GameFlavor::Mbp, 64)
            .err()
            .unwrap();
        assert!(matches!(err, ReplayError::Decompress { .. }));
    }

    // ── Frames ──────────────────────────────────────────────────

    #[test]
    fn frames_come_newest_first() {
        let bytes = encode(GameFlavor::Mbg, &frames(4));
        let r = ReplayReader::from_bytes(bytes, GameFlavor::Mbg, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        let ms: Vec<i32> = r.frames().map(|f| f.unwrap().ms).collect();
        assert_eq!(ms, vec![48, 32, 16, 0]);
    }

    #[test]
    fn stops_at_exhaustion_before_count() {
        let bytes = encode(GameFlavor::Mbg, &frames(2));
        let mut r = ReplayReader::from_bytes(bytes, GameFlavor::Mbg, LEGACY_UNCOMPRESSED_LIMIT)
            .unwrap();
        // The payload holds 2 frames but the header now claims 5.
        r.header.frame_count = 5;
        assert!(r.next_frame().unwrap().is_some());
        assert!(r.next_frame().unwrap().is_some());
        assert!(r.next_frame().unwrap().is_none());
        assert_eq!(r.frames_read(), 2);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut m = MemoryStream::new();
        m.write_u8(1);
        m.write_i32(1);
        m.write_i32(100);
        m.write_i32(16);
        let mut r =
            ReplayReader::from_bytes(m.into_bytes(), GameFlavor::Mbg, 64).unwrap();
        assert!(matches!(
            r.next_frame(),
            Err(ReplayError::EndOfStream { .. })
        ));
    }
}
