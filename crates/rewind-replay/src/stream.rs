//! Seekable, growable little-endian byte buffer.
//!
//! [`MemoryStream`] is the in-memory staging area for replay payloads: the
//! writer encodes frames into it before compressing, and the reader
//! decodes from it after inflating. The cursor and the logical length are
//! independent, so a caller can seek back and overwrite without losing
//! what was written after the cursor.

use crate::error::ReplayError;

/// Capacity of a freshly created stream.
pub const INITIAL_CAPACITY: usize = 256;

/// Growth step when a write reaches the end of the buffer.
pub const GROW_BLOCK: usize = 32 * 1024;

/// A byte buffer with a read/write cursor.
#[derive(Clone, Debug)]
pub struct MemoryStream {
    buffer: Vec<u8>,
    len: usize,
    position: usize,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! le_primitive {
    ($read:ident, $write:ident, $ty:ty) => {
        #[doc = concat!("Read a little-endian `", stringify!($ty), "`.")]
        pub fn $read(&mut self) -> Result<$ty, ReplayError> {
            Ok(<$ty>::from_le_bytes(self.take_array()?))
        }

        #[doc = concat!("Write a little-endian `", stringify!($ty), "`.")]
        pub fn $write(&mut self, v: $ty) {
            self.put(&v.to_le_bytes());
        }
    };
}

impl MemoryStream {
    /// Create an empty stream with [`INITIAL_CAPACITY`] bytes reserved.
    pub fn new() -> Self {
        Self {
            buffer: vec![0; INITIAL_CAPACITY],
            len: 0,
            position: 0,
        }
    }

    /// Wrap existing bytes. The cursor starts at 0 and the logical length
    /// is the full input.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            buffer: bytes,
            len,
            position: 0,
        }
    }

    /// Move the cursor. Positions past the logical end are rejected.
    pub fn seek(&mut self, position: usize) -> Result<(), ReplayError> {
        if position > self.len {
            return Err(ReplayError::EndOfStream {
                position,
                wanted: 0,
                len: self.len,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Current cursor position.
    pub fn tell(&self) -> usize {
        self.position
    }

    /// Logical length: one past the furthest byte ever written.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the cursor has reached the logical end.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.len
    }

    /// Allocated size of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Consume the stream, keeping only the written bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buffer.truncate(self.len);
        self.buffer
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        while end > self.buffer.len() {
            self.buffer.resize(self.buffer.len() + GROW_BLOCK, 0);
        }
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
        self.len = self.len.max(end);
    }

    fn take(&mut self, wanted: usize) -> Result<&[u8], ReplayError> {
        let start = self.position;
        let end = start
            .checked_add(wanted)
            .filter(|&end| end <= self.len)
            .ok_or(ReplayError::EndOfStream {
                position: start,
                wanted,
                len: self.len,
            })?;
        self.position = end;
        Ok(&self.buffer[start..end])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ReplayError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    le_primitive!(read_u8, write_u8, u8);
    le_primitive!(read_u16, write_u16, u16);
    le_primitive!(read_u32, write_u32, u32);
    le_primitive!(read_u64, write_u64, u64);
    le_primitive!(read_i8, write_i8, i8);
    le_primitive!(read_i16, write_i16, i16);
    le_primitive!(read_i32, write_i32, i32);
    le_primitive!(read_i64, write_i64, i64);
    le_primitive!(read_f32, write_f32, f32);
    le_primitive!(read_f64, write_f64, f64);

    /// Read a one-byte boolean; any nonzero byte is true.
    pub fn read_bool(&mut self) -> Result<bool, ReplayError> {
        Ok(self.read_u8()? != 0)
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Read a single-byte character.
    pub fn read_char(&mut self) -> Result<char, ReplayError> {
        Ok(char::from(self.read_u8()?))
    }

    /// Write a single-byte character. Characters outside Latin-1 are
    /// truncated to their low byte.
    pub fn write_char(&mut self, c: char) {
        self.write_u8(c as u32 as u8);
    }

    /// Read a `u32`-length-prefixed string. Invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn read_string(&mut self) -> Result<String, ReplayError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Write a `u32`-length-prefixed string.
    pub fn write_string(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.put(s.as_bytes());
    }
}
