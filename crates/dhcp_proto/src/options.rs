//! DHCP options (RFC 2132): a tag/length/value list following the fixed
//! BOOTP header and magic cookie.

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::MalformedPacket;
use crate::wire::{get_u8, need};

const TAG_PAD: u8 = 0;
const TAG_SUBNET_MASK: u8 = 1;
const TAG_ROUTER: u8 = 3;
const TAG_DOMAIN_NAME_SERVER: u8 = 6;
const TAG_REQUESTED_IP_ADDRESS: u8 = 50;
const TAG_LEASE_TIME: u8 = 51;
const TAG_MESSAGE_TYPE: u8 = 53;
const TAG_SERVER_IDENTIFIER: u8 = 54;
const TAG_END: u8 = 255;

/// The single-byte value of a [`DhcpOption::MessageType`] option (RFC 2132 §9.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
    Other(u8),
}

impl MessageType {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Discover => 1,
            Self::Offer => 2,
            Self::Request => 3,
            Self::Decline => 4,
            Self::Ack => 5,
            Self::Nak => 6,
            Self::Release => 7,
            Self::Inform => 8,
            Self::Other(v) => v,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Discover,
            2 => Self::Offer,
            3 => Self::Request,
            4 => Self::Decline,
            5 => Self::Ack,
            6 => Self::Nak,
            7 => Self::Release,
            8 => Self::Inform,
            other => Self::Other(other),
        }
    }
}

/// One parsed DHCP option. Options this module doesn't special-case are kept
/// as [`Self::Other`] with their tag and raw value, so decode never loses
/// information even for option kinds it doesn't interpret.
#[derive(Debug, Clone, PartialEq)]
pub enum DhcpOption {
    SubnetMask(Ipv4Addr),
    Routers(Vec<Ipv4Addr>),
    DomainNameServers(Vec<Ipv4Addr>),
    RequestedIpAddress(Ipv4Addr),
    LeaseTimeSecs(u32),
    MessageType(MessageType),
    ServerIdentifier(Ipv4Addr),
    Other { tag: u8, data: Vec<u8> },
}

fn ipv4_list(data: &[u8]) -> Vec<Ipv4Addr> {
    data.chunks_exact(4)
        .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
        .collect()
}

fn put_ipv4_list(buf: &mut BytesMut, addrs: &[Ipv4Addr]) {
    for addr in addrs {
        buf.put_slice(&addr.octets());
    }
}

impl DhcpOption {
    fn tag(&self) -> u8 {
        match self {
            Self::SubnetMask(_) => TAG_SUBNET_MASK,
            Self::Routers(_) => TAG_ROUTER,
            Self::DomainNameServers(_) => TAG_DOMAIN_NAME_SERVER,
            Self::RequestedIpAddress(_) => TAG_REQUESTED_IP_ADDRESS,
            Self::LeaseTimeSecs(_) => TAG_LEASE_TIME,
            Self::MessageType(_) => TAG_MESSAGE_TYPE,
            Self::ServerIdentifier(_) => TAG_SERVER_IDENTIFIER,
            Self::Other { tag, .. } => *tag,
        }
    }

    fn encode_value(&self, buf: &mut BytesMut) {
        match self {
            Self::SubnetMask(addr) | Self::RequestedIpAddress(addr) | Self::ServerIdentifier(addr) => {
                buf.put_slice(&addr.octets());
            }
            Self::Routers(addrs) | Self::DomainNameServers(addrs) => put_ipv4_list(buf, addrs),
            Self::LeaseTimeSecs(secs) => buf.put_u32(*secs),
            Self::MessageType(kind) => buf.put_u8(kind.to_u8()),
            Self::Other { data, .. } => buf.put_slice(data),
        }
    }

    fn decode_value(tag: u8, value: &[u8]) -> Result<Self, MalformedPacket> {
        let expect_ipv4 = || {
            if value.len() == 4 {
                Ok(Ipv4Addr::new(value[0], value[1], value[2], value[3]))
            } else {
                Err(MalformedPacket::BadOptionLength {
                    tag,
                    len: value.len(),
                    expected: 4,
                })
            }
        };

        Ok(match tag {
            TAG_SUBNET_MASK => Self::SubnetMask(expect_ipv4()?),
            TAG_ROUTER => Self::Routers(ipv4_list(value)),
            TAG_DOMAIN_NAME_SERVER => Self::DomainNameServers(ipv4_list(value)),
            TAG_REQUESTED_IP_ADDRESS => Self::RequestedIpAddress(expect_ipv4()?),
            TAG_LEASE_TIME => {
                if value.len() != 4 {
                    return Err(MalformedPacket::BadOptionLength {
                        tag,
                        len: value.len(),
                        expected: 4,
                    });
                }
                Self::LeaseTimeSecs(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
            }
            TAG_MESSAGE_TYPE => {
                if value.len() != 1 {
                    return Err(MalformedPacket::BadOptionLength {
                        tag,
                        len: value.len(),
                        expected: 1,
                    });
                }
                Self::MessageType(MessageType::from_u8(value[0]))
            }
            TAG_SERVER_IDENTIFIER => Self::ServerIdentifier(expect_ipv4()?),
            other => Self::Other {
                tag: other,
                data: value.to_vec(),
            },
        })
    }
}

/// Serializes `options` followed by the terminating `End` tag (255). `Pad`
/// bytes are never emitted; nothing in this codec needs them for alignment.
pub fn encode_options(buf: &mut BytesMut, options: &[DhcpOption]) {
    for option in options {
        let mut value = BytesMut::new();
        option.encode_value(&mut value);
        buf.put_u8(option.tag());
        buf.put_u8(value.len() as u8);
        buf.extend_from_slice(&value);
    }
    buf.put_u8(TAG_END);
}

/// Parses options up to (and consuming) the terminating `End` tag, or the
/// end of `buf` if no `End` tag is present.
pub fn decode_options(buf: &mut Bytes) -> Result<Vec<DhcpOption>, MalformedPacket> {
    let mut options = Vec::new();
    while buf.has_remaining() {
        let tag = get_u8(buf)?;
        if tag == TAG_END {
            break;
        }
        if tag == TAG_PAD {
            continue;
        }
        let len = get_u8(buf)? as usize;
        need(buf, len)?;
        let value = buf.split_to(len);
        options.push(DhcpOption::decode_value(tag, &value)?);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mixed_option_set() {
        let options = vec![
            DhcpOption::MessageType(MessageType::Discover),
            DhcpOption::RequestedIpAddress(Ipv4Addr::new(192, 168, 1, 50)),
            DhcpOption::Routers(vec![Ipv4Addr::new(192, 168, 1, 1)]),
            DhcpOption::Other {
                tag: 12,
                data: b"host".to_vec(),
            },
        ];

        let mut buf = BytesMut::new();
        encode_options(&mut buf, &options);

        let mut bytes: Bytes = buf.freeze();
        let decoded = decode_options(&mut bytes).unwrap();
        assert_eq!(decoded, options);
        assert!(bytes.is_empty());
    }

    #[test]
    fn rejects_truncated_option_value() {
        let mut buf = BytesMut::new();
        buf.put_u8(TAG_SUBNET_MASK);
        buf.put_u8(4);
        buf.put_slice(&[255, 255]);
        let mut bytes = buf.freeze();
        assert!(decode_options(&mut bytes).is_err());
    }
}
