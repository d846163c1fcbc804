//! Domain name encoding with RFC 1035 §4.1.4 message compression.
//!
//! Compression here is equality-based: a name is pointed at only if it has
//! been written verbatim before (not the maximal shared-suffix compression a
//! fully optimized encoder would do), the same simplification the reference
//! implementation's `domainNames` map made.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use crate::error::MalformedPacket;

const MAX_JUMPS: usize = 128;
const POINTER_TAG: u8 = 0xC0;

fn read_u8(data: &[u8], offset: usize) -> Result<u8, MalformedPacket> {
    data.get(offset).copied().ok_or(MalformedPacket::UnexpectedEof {
        needed: offset + 1 - data.len(),
    })
}

/// Reads a (possibly compressed) domain name starting at `offset` in the
/// full message `data`. Returns the name and the offset immediately after
/// the name as it appears at the *call site* (i.e. after a pointer's 2
/// bytes, not after whatever the pointer jumps to).
pub fn read_name(data: &[u8], offset: usize) -> Result<(String, usize), MalformedPacket> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = offset;
    let mut return_offset = None;
    let mut jumps = 0usize;

    loop {
        let len_byte = read_u8(data, cursor)?;

        if len_byte == 0 {
            let end = return_offset.unwrap_or(cursor + 1);
            return Ok((labels.join("."), end));
        }

        if len_byte & POINTER_TAG == POINTER_TAG {
            let lo = read_u8(data, cursor + 1)?;
            let pointer = (usize::from(len_byte & !POINTER_TAG) << 8) | usize::from(lo);
            if return_offset.is_none() {
                return_offset = Some(cursor + 2);
            }
            jumps += 1;
            if jumps > MAX_JUMPS || pointer >= cursor {
                return Err(MalformedPacket::BadCompressionPointer);
            }
            cursor = pointer;
            continue;
        }

        if len_byte & POINTER_TAG != 0 {
            return Err(MalformedPacket::BadCompressionPointer);
        }

        let len = len_byte as usize;
        if len > 63 {
            return Err(MalformedPacket::LabelTooLong);
        }
        let start = cursor + 1;
        let end = start + len;
        let label = data.get(start..end).ok_or(MalformedPacket::UnexpectedEof {
            needed: end.saturating_sub(data.len()),
        })?;
        let label = std::str::from_utf8(label).map_err(|_| MalformedPacket::InvalidUtf8)?;
        labels.push(label.to_string());
        if labels.iter().map(|l| l.len() + 1).sum::<usize>() > 255 {
            return Err(MalformedPacket::NameTooLong);
        }
        cursor = end;
    }
}

/// Writes `name` into `buf`, pointing at an earlier occurrence recorded in
/// `compression` if one exists, and recording `name`'s position (the
/// absolute offset within the whole message, i.e. `message_offset +
/// buf.len()`) for future callers to point at otherwise.
pub fn write_name(buf: &mut BytesMut, name: &str, message_offset: usize, compression: &mut HashMap<String, u16>) {
    if name.is_empty() {
        buf.put_u8(0);
        return;
    }

    if let Some(&pointer) = compression.get(name) {
        buf.put_u16(u16::from(POINTER_TAG) << 8 | pointer);
        return;
    }

    let absolute = message_offset + buf.len();
    if absolute <= 0x3FFF {
        compression.insert(name.to_string(), absolute as u16);
    }

    for label in name.split('.') {
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_plain_name() {
        let mut buf = BytesMut::new();
        let mut compression = HashMap::new();
        write_name(&mut buf, "www.example.com", 0, &mut compression);
        let (name, offset) = read_name(&buf, 0).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn second_occurrence_compresses_to_a_pointer() {
        let mut buf = BytesMut::new();
        let mut compression = HashMap::new();
        write_name(&mut buf, "example.com", 0, &mut compression);
        let first_len = buf.len();
        write_name(&mut buf, "example.com", 0, &mut compression);
        assert_eq!(buf.len() - first_len, 2, "second write should be a 2-byte pointer");

        let (first, _) = read_name(&buf, 0).unwrap();
        let (second, _) = read_name(&buf, first_len).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_a_pointer_loop() {
        // byte 0: pointer to itself (0xC0 0x00)
        let data = [0xC0u8, 0x00];
        assert!(matches!(
            read_name(&data, 0),
            Err(MalformedPacket::BadCompressionPointer)
        ));
    }
}
