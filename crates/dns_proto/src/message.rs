//! The DNS message envelope: header, question section, and the three
//! resource-record sections (RFC 1035 §4).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};

use crate::error::MalformedPacket;
use crate::name::{read_name, write_name};

const TYPE_A: u16 = 1;
const TYPE_NS: u16 = 2;
const TYPE_CNAME: u16 = 5;
const TYPE_PTR: u16 = 12;

/// RFC 1035 §4.1.1's two flag bytes, decomposed into their fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub is_response: bool,
    pub opcode: u8,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: u8,
}

impl Flags {
    fn to_u16(self) -> u16 {
        let mut byte1 = u16::from(self.is_response) << 7;
        byte1 |= u16::from(self.opcode & 0x0F) << 3;
        byte1 |= u16::from(self.authoritative) << 2;
        byte1 |= u16::from(self.truncated) << 1;
        byte1 |= u16::from(self.recursion_desired);

        let byte2 = u16::from(self.recursion_available) << 7 | u16::from(self.rcode & 0x0F);

        (byte1 << 8) | byte2
    }

    fn from_u16(v: u16) -> Self {
        let byte1 = (v >> 8) as u8;
        let byte2 = v as u8;
        Self {
            is_response: byte1 & 0x80 != 0,
            opcode: (byte1 >> 3) & 0x0F,
            authoritative: byte1 & 0x04 != 0,
            truncated: byte1 & 0x02 != 0,
            recursion_desired: byte1 & 0x01 != 0,
            recursion_available: byte2 & 0x80 != 0,
            rcode: byte2 & 0x0F,
        }
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// A resource record's type-specific data. Types whose RDATA is itself a
/// domain name ([`TYPE_CNAME`], [`TYPE_NS`], [`TYPE_PTR`]) get first-class
/// handling, including compression; everything else is kept as opaque
/// bytes so decode never loses data for a type this codec doesn't interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    Address(Ipv4Addr),
    Name(String),
    Raw(Vec<u8>),
}

/// One answer/authority/additional record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdata: RData,
}

/// A full DNS message: header plus its four record sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u16,
    pub flags: Flags,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, MalformedPacket> {
    let bytes = data.get(offset..offset + 2).ok_or(MalformedPacket::UnexpectedEof {
        needed: offset + 2 - data.len(),
    })?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, MalformedPacket> {
    let bytes = data.get(offset..offset + 4).ok_or(MalformedPacket::UnexpectedEof {
        needed: offset + 4 - data.len(),
    })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn encode_record(buf: &mut BytesMut, record: &ResourceRecord, compression: &mut HashMap<String, u16>) {
    write_name(buf, &record.name, 0, compression);
    buf.put_u16(record.rtype);
    buf.put_u16(record.rclass);
    buf.put_u32(record.ttl);

    let rdlen_pos = buf.len();
    buf.put_u16(0);
    let rdata_start = buf.len();
    match &record.rdata {
        RData::Address(addr) => buf.put_slice(&addr.octets()),
        RData::Name(name) => write_name(buf, name, 0, compression),
        RData::Raw(bytes) => buf.put_slice(bytes),
    }
    let rdlen = (buf.len() - rdata_start) as u16;
    buf[rdlen_pos..rdlen_pos + 2].copy_from_slice(&rdlen.to_be_bytes());
}

fn decode_record(data: &[u8], offset: &mut usize) -> Result<ResourceRecord, MalformedPacket> {
    let (name, after_name) = read_name(data, *offset)?;
    let rtype = read_u16(data, after_name)?;
    let rclass = read_u16(data, after_name + 2)?;
    let ttl = read_u32(data, after_name + 4)?;
    let rdlength = read_u16(data, after_name + 8)? as usize;
    let rdata_start = after_name + 10;
    let rdata_end = rdata_start + rdlength;
    let rdata_bytes = data.get(rdata_start..rdata_end).ok_or(MalformedPacket::UnexpectedEof {
        needed: rdata_end.saturating_sub(data.len()),
    })?;

    let rdata = match rtype {
        TYPE_A if rdata_bytes.len() == 4 => {
            RData::Address(Ipv4Addr::new(rdata_bytes[0], rdata_bytes[1], rdata_bytes[2], rdata_bytes[3]))
        }
        TYPE_CNAME | TYPE_NS | TYPE_PTR => RData::Name(read_name(data, rdata_start)?.0),
        _ => RData::Raw(rdata_bytes.to_vec()),
    };

    *offset = rdata_end;
    Ok(ResourceRecord {
        name,
        rtype,
        rclass,
        ttl,
        rdata,
    })
}

impl Message {
    /// Serializes the whole message, compressing names where a name
    /// (question or record) repeats one already written.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(512);
        buf.put_u16(self.id);
        buf.put_u16(self.flags.to_u16());
        buf.put_u16(self.questions.len() as u16);
        buf.put_u16(self.answers.len() as u16);
        buf.put_u16(self.authorities.len() as u16);
        buf.put_u16(self.additionals.len() as u16);

        let mut compression = HashMap::new();
        for question in &self.questions {
            write_name(&mut buf, &question.name, 0, &mut compression);
            buf.put_u16(question.qtype);
            buf.put_u16(question.qclass);
        }
        for record in self.answers.iter().chain(&self.authorities).chain(&self.additionals) {
            encode_record(&mut buf, record, &mut compression);
        }

        buf.to_vec()
    }

    /// Parses a message from its wire representation.
    pub fn decode(data: &[u8]) -> Result<Self, MalformedPacket> {
        let id = read_u16(data, 0)?;
        let flags = Flags::from_u16(read_u16(data, 2)?);
        let qdcount = read_u16(data, 4)? as usize;
        let ancount = read_u16(data, 6)? as usize;
        let nscount = read_u16(data, 8)? as usize;
        let arcount = read_u16(data, 10)? as usize;

        let mut offset = 12;
        let mut questions = Vec::with_capacity(qdcount);
        for _ in 0..qdcount {
            let (name, after_name) = read_name(data, offset)?;
            let qtype = read_u16(data, after_name)?;
            let qclass = read_u16(data, after_name + 2)?;
            offset = after_name + 4;
            questions.push(Question { name, qtype, qclass });
        }

        let mut read_records = |count: usize, offset: &mut usize| -> Result<Vec<ResourceRecord>, MalformedPacket> {
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                records.push(decode_record(data, offset)?);
            }
            Ok(records)
        };

        let answers = read_records(ancount, &mut offset)?;
        let authorities = read_records(nscount, &mut offset)?;
        let additionals = read_records(arcount, &mut offset)?;

        Ok(Self {
            id,
            flags,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Message {
        Message {
            id: 0x1234,
            flags: Flags {
                is_response: false,
                opcode: 0,
                authoritative: false,
                truncated: false,
                recursion_desired: true,
                recursion_available: false,
                rcode: 0,
            },
            questions: vec![Question {
                name: "example.com".to_string(),
                qtype: TYPE_A,
                qclass: 1,
            }],
            answers: vec![],
            authorities: vec![],
            additionals: vec![],
        }
    }

    #[test]
    fn round_trips_a_query() {
        let message = query();
        let decoded = Message::decode(&message.encode()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn round_trips_a_response_with_an_a_record_and_reuses_the_question_name() {
        let mut message = query();
        message.flags.is_response = true;
        message.flags.recursion_available = true;
        message.answers.push(ResourceRecord {
            name: "example.com".to_string(),
            rtype: TYPE_A,
            rclass: 1,
            ttl: 300,
            rdata: RData::Address(Ipv4Addr::new(93, 184, 216, 34)),
        });

        let encoded = message.encode();
        // the answer's name should have compressed to a pointer rather than
        // repeating "example.com" in full.
        assert!(encoded.len() < 2 * "example.com".len() + 40);

        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn round_trips_a_cname_chain() {
        let mut message = query();
        message.flags.is_response = true;
        message.answers.push(ResourceRecord {
            name: "example.com".to_string(),
            rtype: TYPE_CNAME,
            rclass: 1,
            ttl: 300,
            rdata: RData::Name("canonical.example.com".to_string()),
        });

        let decoded = Message::decode(&message.encode()).unwrap();
        assert_eq!(decoded, message);
    }
}
