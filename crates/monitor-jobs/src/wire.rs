//! Length-prefixed `postcard` framing for the worker IPC channel (spec:
//! "a framed binary channel carrying `JobSpec` and `Result` messages").
//! Unlike `monitor-cache`'s `status.db` frames this carries no checksum:
//! the channel is a live pipe, not persisted storage, and a torn message
//! here means the worker died, which the engine already detects by the
//! pipe closing.

use std::io::{self, Read, Write};

use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard encode/decode error: {0}")]
    Postcard(#[from] postcard::Error),
}

pub fn write_message<T: Serialize>(writer: &mut impl Write, value: &T) -> Result<(), WireError> {
    let payload = postcard::to_allocvec(value)?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Returns `Ok(None)` when the channel closed cleanly between messages.
pub fn read_message<T: DeserializeOwned>(reader: &mut impl Read) -> Result<Option<T>, WireError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(postcard::from_bytes(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_message() {
        let mut buf = Vec::new();
        write_message(&mut buf, &"hello".to_string()).unwrap();
        write_message(&mut buf, &"world".to_string()).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let a: String = read_message(&mut cursor).unwrap().unwrap();
        let b: String = read_message(&mut cursor).unwrap().unwrap();
        assert_eq!((a, b), ("hello".to_string(), "world".to_string()));
        let eof: Option<String> = read_message(&mut cursor).unwrap();
        assert!(eof.is_none());
    }
}
