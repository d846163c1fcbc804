//! Low-level little-endian read/write helpers shared by every layer.
//!
//! Every read checks remaining length before touching the buffer; the codec
//! as a whole is therefore total over arbitrary byte input.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::MalformedPacket;

pub(crate) fn need(buf: &Bytes, n: usize) -> Result<(), MalformedPacket> {
    if buf.remaining() < n {
        Err(MalformedPacket::UnexpectedEof {
            needed: n - buf.remaining(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn get_u8(buf: &mut Bytes) -> Result<u8, MalformedPacket> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_bool(buf: &mut Bytes) -> Result<bool, MalformedPacket> {
    Ok(get_u8(buf)? != 0)
}

pub(crate) fn get_u32(buf: &mut Bytes) -> Result<u32, MalformedPacket> {
    need(buf, 4)?;
    Ok(buf.get_u32_le())
}

pub(crate) fn get_bytes(buf: &mut Bytes, len: usize) -> Result<Bytes, MalformedPacket> {
    need(buf, len)?;
    Ok(buf.split_to(len))
}

pub(crate) fn get_string(buf: &mut Bytes) -> Result<String, MalformedPacket> {
    let len = get_u32(buf)? as usize;
    let bytes = get_bytes(buf, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| MalformedPacket::InvalidUtf8)
}

/// Reads a length-prefixed string whose length prefix is a single byte, used
/// only by [`crate::Response`]'s error message (`u8 err_len`).
pub(crate) fn get_short_string(buf: &mut Bytes) -> Result<String, MalformedPacket> {
    let len = get_u8(buf)? as usize;
    let bytes = get_bytes(buf, len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| MalformedPacket::InvalidUtf8)
}

pub(crate) fn put_bool(buf: &mut BytesMut, v: bool) {
    buf.put_u8(u8::from(v));
}

pub(crate) fn put_u32(buf: &mut BytesMut, v: u32) {
    buf.put_u32_le(v);
}

pub(crate) fn put_string(buf: &mut BytesMut, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Writes a short string with a single-byte length prefix, truncating to 255
/// bytes if necessary (only used for already-short human-readable messages).
pub(crate) fn put_short_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(u8::MAX as usize);
    buf.put_u8(len as u8);
    buf.put_slice(&bytes[..len]);
}
