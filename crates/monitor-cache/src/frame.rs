//! Versioned, self-describing binary frames used for `status.db`.
//!
//! Replaces the pickle-style persistence the source used (see
//! spec.md §9): each frame is `[schema_tag: u16][len: u32][payload:
//! postcard][checksum: 8 bytes]`. A torn write (process killed mid-append)
//! leaves a frame whose checksum or length does not match — such a
//! frame, and everything read would depend on it, is discarded and the
//! cache falls back to a full rescan (spec.md §4.3, §7).

use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};

use serde::{Serialize, de::DeserializeOwned};

/// Current schema tag for the status aggregate frame. Bump this when the
/// on-disk shape of `StatusAggregate` changes incompatibly.
pub const STATUS_AGGREGATE_SCHEMA_TAG: u16 = 1;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard encode/decode error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("frame checksum mismatch (torn write)")]
    ChecksumMismatch,
    #[error("unexpected schema tag {found}, expected {expected}")]
    SchemaMismatch { found: u16, expected: u16 },
}

fn checksum(bytes: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Encode `value` as a single versioned frame.
pub fn write_frame<T: Serialize>(writer: &mut impl Write, schema_tag: u16, value: &T) -> Result<(), FrameError> {
    let payload = postcard::to_allocvec(value)?;
    writer.write_all(&schema_tag.to_le_bytes())?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&checksum(&payload))?;
    Ok(())
}

/// Decode a single frame, verifying its schema tag and checksum.
/// Returns `Ok(None)` at a clean end-of-stream (no bytes read at all).
pub fn read_frame<T: DeserializeOwned>(reader: &mut impl Read, expected_schema_tag: u16) -> Result<Option<T>, FrameError> {
    let mut tag_buf = [0u8; 2];
    match reader.read_exact(&mut tag_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let schema_tag = u16::from_le_bytes(tag_buf);
    if schema_tag != expected_schema_tag {
        return Err(FrameError::SchemaMismatch { found: schema_tag, expected: expected_schema_tag });
    }
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    let mut sum_buf = [0u8; 8];
    reader.read_exact(&mut sum_buf)?;
    if sum_buf != checksum(&payload) {
        return Err(FrameError::ChecksumMismatch);
    }
    let value = postcard::from_bytes(&payload)?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 7, &"hello".to_string()).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let value: String = read_frame(&mut cursor, 7).unwrap().unwrap();
        assert_eq!(value, "hello");
    }

    #[test]
    fn detects_torn_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, &"hello".to_string()).unwrap();
        buf.truncate(buf.len() - 3); // corrupt the checksum
        let mut cursor = std::io::Cursor::new(buf);
        let result: Result<Option<String>, FrameError> = read_frame(&mut cursor, 1);
        assert!(result.is_err());
    }

    #[test]
    fn detects_schema_mismatch() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 1, &"hello".to_string()).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let result: Result<Option<String>, FrameError> = read_frame(&mut cursor, 2);
        assert!(matches!(result, Err(FrameError::SchemaMismatch { .. })));
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let result: Option<String> = read_frame(&mut cursor, 1).unwrap();
        assert!(result.is_none());
    }
}
