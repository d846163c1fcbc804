//! Encoding for `list` payloads.
//!
//! A listing travels to the client the same way a download does: as an
//! opaque byte blob handed to the windowed sender. This module is what
//! produces and consumes that blob; `rdft_proto` never sees it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::RdftError;
use crate::storage::ListEntry;

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_string(buf: &mut Bytes) -> Result<String, RdftError> {
    if buf.remaining() < 4 {
        return Err(RdftError::InvalidArgument("truncated list entry".into()));
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        return Err(RdftError::InvalidArgument("truncated list entry".into()));
    }
    let bytes = buf.split_to(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| RdftError::InvalidArgument("list entry name is not valid UTF-8".into()))
}

/// Serializes `entries` in order, one block per entry.
#[must_use]
pub fn encode(entries: &[ListEntry]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for entry in entries {
        match entry {
            ListEntry::Directory { name, mtime } => {
                buf.put_u8(1);
                put_string(&mut buf, name);
                buf.put_f64_le(*mtime);
            }
            ListEntry::File { name, mtime, size } => {
                buf.put_u8(0);
                put_string(&mut buf, name);
                buf.put_f64_le(*mtime);
                buf.put_u64_le(*size);
            }
        }
    }
    buf.to_vec()
}

/// Parses a byte blob produced by [`encode`] back into entries.
pub fn decode(payload: &[u8]) -> Result<Vec<ListEntry>, RdftError> {
    let mut buf = Bytes::copy_from_slice(payload);
    let mut out = Vec::new();
    while buf.has_remaining() {
        let is_directory = buf.get_u8() != 0;
        let name = get_string(&mut buf)?;
        if buf.remaining() < 8 {
            return Err(RdftError::InvalidArgument("truncated list entry".into()));
        }
        let mtime = buf.get_f64_le();
        if is_directory {
            out.push(ListEntry::Directory { name, mtime });
        } else {
            if buf.remaining() < 8 {
                return Err(RdftError::InvalidArgument("truncated list entry".into()));
            }
            let size = buf.get_u64_le();
            out.push(ListEntry::File { name, mtime, size });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_entries() {
        let entries = vec![
            ListEntry::Directory {
                name: "a".into(),
                mtime: 12.5,
            },
            ListEntry::File {
                name: "a/c.txt".into(),
                mtime: 99.0,
                size: 42,
            },
            ListEntry::File {
                name: "b.txt".into(),
                mtime: 1.0,
                size: 0,
            },
        ];
        let encoded = encode(&entries);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn empty_listing_round_trips() {
        assert_eq!(decode(&encode(&[])).unwrap(), Vec::new());
    }
}
