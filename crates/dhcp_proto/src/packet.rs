//! The fixed BOOTP header (RFC 951) plus the DHCP magic cookie and options
//! tail (RFC 2131 §2, RFC 2132).

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::MalformedPacket;
use crate::options::{DhcpOption, decode_options, encode_options};
use crate::wire::{get_array, get_u16, get_u32, get_u8, need, put_u16, put_u32};

/// RFC 2131 §3's fixed magic cookie that separates the BOOTP header from the
/// option list.
pub const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

/// First byte of the header: which direction this packet flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    BootRequest,
    BootReply,
}

impl Op {
    const fn to_u8(self) -> u8 {
        match self {
            Self::BootRequest => 1,
            Self::BootReply => 2,
        }
    }

    const fn from_u8(v: u8) -> Result<Self, MalformedPacket> {
        match v {
            1 => Ok(Self::BootRequest),
            2 => Ok(Self::BootReply),
            other => Err(MalformedPacket::InvalidOp(other)),
        }
    }
}

fn ipv4_from_u32(v: u32) -> Ipv4Addr {
    Ipv4Addr::from(v.to_be_bytes())
}

fn ipv4_to_u32(addr: Ipv4Addr) -> u32 {
    u32::from_be_bytes(addr.octets())
}

/// A fully decoded DHCP/BOOTP packet: fixed header, hardware address, the
/// (usually unused) legacy server-name/boot-file fields, and the options
/// list that carries everything DHCP actually negotiates.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub op: Op,
    pub htype: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub broadcast: bool,
    pub client_addr: Ipv4Addr,
    pub your_addr: Ipv4Addr,
    pub server_addr: Ipv4Addr,
    pub gateway_addr: Ipv4Addr,
    /// Client hardware address, left-padded to 16 bytes; only the first
    /// `hlen` bytes (implied by `htype`; 6 for Ethernet) are meaningful.
    pub client_hw_addr: [u8; 16],
    pub server_name: [u8; 64],
    pub boot_file: [u8; 128],
    pub options: Vec<DhcpOption>,
}

const FLAG_BROADCAST: u16 = 0x8000;

impl Packet {
    /// Serializes the packet: fixed header, magic cookie, then options.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(300);
        buf.put_u8(self.op.to_u8());
        buf.put_u8(self.htype);
        buf.put_u8(6); // hlen: fixed at 6 for the Ethernet addresses this codec models.
        buf.put_u8(self.hops);
        put_u32(&mut buf, self.xid);
        put_u16(&mut buf, self.secs);
        put_u16(&mut buf, if self.broadcast { FLAG_BROADCAST } else { 0 });
        put_u32(&mut buf, ipv4_to_u32(self.client_addr));
        put_u32(&mut buf, ipv4_to_u32(self.your_addr));
        put_u32(&mut buf, ipv4_to_u32(self.server_addr));
        put_u32(&mut buf, ipv4_to_u32(self.gateway_addr));
        buf.put_slice(&self.client_hw_addr);
        buf.put_slice(&self.server_name);
        buf.put_slice(&self.boot_file);
        buf.put_slice(&MAGIC_COOKIE);
        encode_options(&mut buf, &self.options);
        buf.freeze()
    }

    /// Parses a packet from its wire representation.
    pub fn decode(data: impl Into<Bytes>) -> Result<Self, MalformedPacket> {
        let mut buf: Bytes = data.into();

        let op = Op::from_u8(get_u8(&mut buf)?)?;
        let htype = get_u8(&mut buf)?;
        let _hlen = get_u8(&mut buf)?;
        let hops = get_u8(&mut buf)?;
        let xid = get_u32(&mut buf)?;
        let secs = get_u16(&mut buf)?;
        let flags = get_u16(&mut buf)?;
        let client_addr = ipv4_from_u32(get_u32(&mut buf)?);
        let your_addr = ipv4_from_u32(get_u32(&mut buf)?);
        let server_addr = ipv4_from_u32(get_u32(&mut buf)?);
        let gateway_addr = ipv4_from_u32(get_u32(&mut buf)?);
        let client_hw_addr = get_array::<16>(&mut buf)?;
        let server_name = get_array::<64>(&mut buf)?;
        let boot_file = get_array::<128>(&mut buf)?;

        need(&buf, 4)?;
        let cookie = buf.split_to(4);
        if cookie.as_ref() != MAGIC_COOKIE {
            return Err(MalformedPacket::BadMagicCookie);
        }

        let options = decode_options(&mut buf)?;

        Ok(Self {
            op,
            htype,
            hops,
            xid,
            secs,
            broadcast: flags & FLAG_BROADCAST != 0,
            client_addr,
            your_addr,
            server_addr,
            gateway_addr,
            client_hw_addr,
            server_name,
            boot_file,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MessageType;

    fn sample() -> Packet {
        Packet {
            op: Op::BootRequest,
            htype: 1,
            hops: 0,
            xid: 0x3903_F326,
            secs: 0,
            broadcast: false,
            client_addr: Ipv4Addr::UNSPECIFIED,
            your_addr: Ipv4Addr::UNSPECIFIED,
            server_addr: Ipv4Addr::UNSPECIFIED,
            gateway_addr: Ipv4Addr::UNSPECIFIED,
            client_hw_addr: {
                let mut a = [0u8; 16];
                a[..6].copy_from_slice(&[0x00, 0x0c, 0x29, 0x3e, 0x1a, 0x2b]);
                a
            },
            server_name: [0u8; 64],
            boot_file: [0u8; 128],
            options: vec![DhcpOption::MessageType(MessageType::Discover)],
        }
    }

    #[test]
    fn round_trips_a_discover_packet() {
        let packet = sample();
        let encoded = packet.encode();
        assert_eq!(&encoded[236..240], &MAGIC_COOKIE);
        let decoded = Packet::decode(encoded).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn rejects_wrong_magic_cookie() {
        let mut encoded = sample().encode().to_vec();
        encoded[236] = 0;
        assert!(matches!(
            Packet::decode(encoded),
            Err(MalformedPacket::BadMagicCookie)
        ));
    }

    #[test]
    fn round_trips_broadcast_flag() {
        let mut packet = sample();
        packet.broadcast = true;
        let decoded = Packet::decode(packet.encode()).unwrap();
        assert!(decoded.broadcast);
    }
}
