//! Wire format and codec for the Reliable Datagram File Transfer protocol.
//!
//! This crate owns exactly one concern: turning [`Packet`] values into bytes
//! and back. It knows nothing about sockets, retransmission, or storage —
//! see `rdft_net` and `rdft_core` for those.

mod constants;
mod error;
mod packet;
mod wire;

pub use constants::{
    CUBIC_B, CUBIC_C, CWND_START, SINGLE_SEGMENT_SIZE_MAX, SINGLE_SEGMENT_SIZE_MIN,
    SOCKET_MAXSIZE, SOCKET_TIMEOUT_MS, UNSOLICITED_REQUEST_ID,
};
pub use error::MalformedPacket;
pub use packet::{Kind, Packet, RequestOp, ResponseSub, SubKind};

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn roundtrip(p: &Packet) {
        let encoded = p.encode();
        let decoded = Packet::decode(encoded).expect("decode of our own encode must succeed");
        assert_eq!(&decoded, p);
    }

    #[test]
    fn roundtrips_upload_request() {
        roundtrip(&Packet::Request {
            request_id: 7,
            data_size: 4096,
            max_segment_size: 1200,
            anonymous: false,
            user_name: "alice".into(),
            password: "hunter2".into(),
            op: RequestOp::Upload {
                path: "docs/notes.txt".into(),
            },
        });
    }

    #[test]
    fn roundtrips_anonymous_list_request() {
        roundtrip(&Packet::Request {
            request_id: 1,
            data_size: 0,
            max_segment_size: 0,
            anonymous: true,
            user_name: String::new(),
            password: String::new(),
            op: RequestOp::List {
                path: "public".into(),
                recursive: true,
            },
        });
    }

    #[test]
    fn roundtrips_delete_request_and_response() {
        roundtrip(&Packet::Request {
            request_id: 42,
            data_size: 0,
            max_segment_size: 0,
            anonymous: false,
            user_name: "bob".into(),
            password: "pw".into(),
            op: RequestOp::Delete {
                path: "archive/old.zip".into(),
            },
        });
        roundtrip(&Packet::Response {
            request_id: 42,
            ok: true,
            error: String::new(),
            data_size: 0,
            segments_amount: 0,
            single_segment_size: 0,
            sub: ResponseSub::Delete { is_file: true },
        });
    }

    #[test]
    fn roundtrips_error_response_with_message() {
        roundtrip(&Packet::Response {
            request_id: 5,
            ok: false,
            error: "path escapes storage root".into(),
            data_size: 0,
            segments_amount: 0,
            single_segment_size: 0,
            sub: ResponseSub::None,
        });
    }

    #[test]
    fn roundtrips_segment_and_ack() {
        roundtrip(&Packet::Segment {
            request_id: 3,
            segment_id: 128,
            payload: Bytes::from_static(b"some file bytes"),
        });
        roundtrip(&Packet::Segment {
            request_id: 3,
            segment_id: 129,
            payload: Bytes::new(),
        });
        roundtrip(&Packet::Ack {
            request_id: 3,
            segment_id: 128,
        });
    }

    #[test]
    fn roundtrips_bare_control_packets() {
        roundtrip(&Packet::ReadyForDownloading { request_id: 9 });
        roundtrip(&Packet::DownloadCompleted { request_id: 9 });
        roundtrip(&Packet::Close { request_id: 9 });
        roundtrip(&Packet::unsolicited_close());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let full = Packet::Ack {
            request_id: 1,
            segment_id: 2,
        }
        .encode();
        let truncated = full.slice(..full.len() - 1);
        assert!(matches!(
            Packet::decode(truncated),
            Err(MalformedPacket::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn rejects_unknown_kind_byte() {
        let bytes = Bytes::from_static(&[0xFF, 0, 0, 0, 0, 0]);
        assert!(matches!(
            Packet::decode(bytes),
            Err(MalformedPacket::InvalidKind(0xFF))
        ));
    }

    #[test]
    fn rejects_request_with_unknown_sub_kind() {
        let mut raw = vec![Kind::Request as u8, SubKind::Unknown as u8];
        raw.extend_from_slice(&0u32.to_le_bytes()); // request_id
        raw.extend_from_slice(&0u32.to_le_bytes()); // data_size
        raw.extend_from_slice(&0u32.to_le_bytes()); // max_segment_size
        raw.push(0); // anonymous
        raw.extend_from_slice(&0u32.to_le_bytes()); // user_name len
        raw.extend_from_slice(&0u32.to_le_bytes()); // password len
        assert!(matches!(
            Packet::decode(Bytes::from(raw)),
            Err(MalformedPacket::UnexpectedSubKind {
                kind: Kind::Request,
                sub_kind: SubKind::Unknown
            })
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut raw = Packet::Close { request_id: 1 }.encode().to_vec();
        raw.push(0xAB);
        assert!(matches!(
            Packet::decode(Bytes::from(raw)),
            Err(MalformedPacket::TrailingBytes(1))
        ));
    }

    #[test]
    fn rejects_non_utf8_string_field() {
        let mut raw = vec![Kind::Close as u8, SubKind::Unknown as u8];
        raw.extend_from_slice(&1u32.to_le_bytes());
        let close = Bytes::from(raw);
        assert!(Packet::decode(close).is_ok());

        let mut raw = vec![Kind::Request as u8, SubKind::Upload as u8];
        raw.extend_from_slice(&0u32.to_le_bytes()); // request_id
        raw.extend_from_slice(&0u32.to_le_bytes()); // data_size
        raw.extend_from_slice(&0u32.to_le_bytes()); // max_segment_size
        raw.push(0); // anonymous
        raw.extend_from_slice(&1u32.to_le_bytes()); // user_name len = 1
        raw.push(0xFF); // invalid utf8 byte
        assert!(matches!(
            Packet::decode(Bytes::from(raw)),
            Err(MalformedPacket::InvalidUtf8)
        ));
    }
}
