//! Big-endian (network byte order) read/write helpers, mirroring
//! `rdft_proto::wire`'s total-over-arbitrary-input discipline.

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

pub(crate) fn get_u16(buf: &mut Bytes) -> Result<u16, MalformedPacket> {
    need(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut Bytes) -> Result<u32, MalformedPacket> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_array<const N: usize>(buf: &mut Bytes) -> Result<[u8; N], MalformedPacket> {
    need(buf, N)?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub(crate) fn put_u16(buf: &mut BytesMut, v: u16) {
    buf.put_u16(v);
}

pub(crate) fn put_u32(buf: &mut BytesMut, v: u32) {
    buf.put_u32(v);
}
