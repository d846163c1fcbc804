//! The [`Packet`] sum type and its codec.
//!
//! This file is ordered so the whole wire protocol can be read top-to-bottom:
//! discriminator codes, then the layers each kind carries, then the packet
//! enum itself and its `encode`/`decode`.

use bytes::{Bytes, BytesMut};

use crate::{
    error::MalformedPacket,
    wire::{
        get_bool, get_bytes, get_short_string, get_string, get_u32, get_u8, put_bool, put_string,
        put_u32,
    },
};

/// Discriminator for the first field of every packet's `Basic` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Request = 1,
    Response = 2,
    ReadyForDownloading = 3,
    Segment = 4,
    Ack = 5,
    DownloadCompleted = 6,
    Close = 7,
}

impl Kind {
    const fn to_u8(self) -> u8 {
        self as u8
    }

    const fn from_u8(v: u8) -> Result<Self, MalformedPacket> {
        match v {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            3 => Ok(Self::ReadyForDownloading),
            4 => Ok(Self::Segment),
            5 => Ok(Self::Ack),
            6 => Ok(Self::DownloadCompleted),
            7 => Ok(Self::Close),
            other => Err(MalformedPacket::InvalidKind(other)),
        }
    }
}

/// Discriminator for the second field of the `Basic` layer.
///
/// Present on every packet, but only meaningful for [`Kind::Request`] (which
/// operation) and [`Kind::Response`] (whether a [`ResponseSub::Delete`] layer
/// follows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubKind {
    #[default]
    Unknown = 0,
    Upload = 1,
    Download = 2,
    List = 3,
    Delete = 4,
}

impl SubKind {
    const fn to_u8(self) -> u8 {
        self as u8
    }

    const fn from_u8(v: u8) -> Result<Self, MalformedPacket> {
        match v {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Upload),
            2 => Ok(Self::Download),
            3 => Ok(Self::List),
            4 => Ok(Self::Delete),
            other => Err(MalformedPacket::InvalidSubKind(other)),
        }
    }
}

/// The operation-specific tail of a [`Kind::Request`] packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOp {
    Upload { path: String },
    Download { path: String },
    List { path: String, recursive: bool },
    Delete { path: String },
}

impl RequestOp {
    const fn sub_kind(&self) -> SubKind {
        match self {
            Self::Upload { .. } => SubKind::Upload,
            Self::Download { .. } => SubKind::Download,
            Self::List { .. } => SubKind::List,
            Self::Delete { .. } => SubKind::Delete,
        }
    }
}

/// The operation-specific tail of a [`Kind::Response`] packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseSub {
    #[default]
    None,
    Delete {
        is_file: bool,
    },
}

/// A fully decoded RDFT packet.
///
/// Deliberately a flat sum type rather than a struct of optional layers: the
/// wire's `(kind, sub_kind)` discriminator maps onto one Rust variant per
/// combination the format actually produces, so matching on a `Packet` is
/// exhaustive and a caller can never observe an inconsistent layer
/// combination (e.g. a `Segment` with a `DeleteResponse` attached).
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Request {
        request_id: u32,
        data_size: u32,
        max_segment_size: u32,
        anonymous: bool,
        user_name: String,
        password: String,
        op: RequestOp,
    },
    Response {
        request_id: u32,
        ok: bool,
        error: String,
        data_size: u32,
        segments_amount: u32,
        single_segment_size: u32,
        sub: ResponseSub,
    },
    ReadyForDownloading {
        request_id: u32,
    },
    Segment {
        request_id: u32,
        segment_id: u32,
        payload: Bytes,
    },
    Ack {
        request_id: u32,
        segment_id: u32,
    },
    DownloadCompleted {
        request_id: u32,
    },
    Close {
        request_id: u32,
    },
}

impl Packet {
    /// The `request_id` carried by every packet's `Basic` layer.
    #[must_use]
    pub const fn request_id(&self) -> u32 {
        match self {
            Self::Request { request_id, .. }
            | Self::Response { request_id, .. }
            | Self::ReadyForDownloading { request_id }
            | Self::Segment { request_id, .. }
            | Self::Ack { request_id, .. }
            | Self::DownloadCompleted { request_id }
            | Self::Close { request_id } => *request_id,
        }
    }

    /// Builds an unsolicited `Close` for `request_id = 0`, sent to a peer
    /// whose traffic the registry cannot attribute to any handler.
    #[must_use]
    pub const fn unsolicited_close() -> Self {
        Self::Close {
            request_id: crate::constants::UNSOLICITED_REQUEST_ID,
        }
    }

    /// Builds an unsolicited error `Response` for `request_id = 0`.
    #[must_use]
    pub fn unsolicited_error(message: impl Into<String>) -> Self {
        Self::Response {
            request_id: crate::constants::UNSOLICITED_REQUEST_ID,
            ok: false,
            error: message.into(),
            data_size: 0,
            segments_amount: 0,
            single_segment_size: 0,
            sub: ResponseSub::None,
        }
    }

    const fn kind(&self) -> Kind {
        match self {
            Self::Request { .. } => Kind::Request,
            Self::Response { .. } => Kind::Response,
            Self::ReadyForDownloading { .. } => Kind::ReadyForDownloading,
            Self::Segment { .. } => Kind::Segment,
            Self::Ack { .. } => Kind::Ack,
            Self::DownloadCompleted { .. } => Kind::DownloadCompleted,
            Self::Close { .. } => Kind::Close,
        }
    }

    fn sub_kind(&self) -> SubKind {
        match self {
            Self::Request { op, .. } => op.sub_kind(),
            Self::Response { sub, .. } => match sub {
                ResponseSub::None => SubKind::Unknown,
                ResponseSub::Delete { .. } => SubKind::Delete,
            },
            _ => SubKind::Unknown,
        }
    }

    /// Serializes this packet to its wire representation.
    ///
    /// The result is always well formed and, for any packet in the domain
    /// described by the wire format, `decode(&encode(p)) == Ok(p)`.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[self.kind().to_u8(), self.sub_kind().to_u8()]);
        put_u32(&mut buf, self.request_id());

        match self {
            Self::Request {
                data_size,
                max_segment_size,
                anonymous,
                user_name,
                password,
                op,
                ..
            } => {
                put_u32(&mut buf, *data_size);
                put_u32(&mut buf, *max_segment_size);
                put_bool(&mut buf, *anonymous);
                put_string(&mut buf, user_name);
                put_string(&mut buf, password);
                match op {
                    RequestOp::Upload { path }
                    | RequestOp::Download { path }
                    | RequestOp::Delete { path } => put_string(&mut buf, path),
                    RequestOp::List { path, recursive } => {
                        put_string(&mut buf, path);
                        put_bool(&mut buf, *recursive);
                    }
                }
            }
            Self::Response {
                ok,
                error,
                data_size,
                segments_amount,
                single_segment_size,
                sub,
                ..
            } => {
                put_bool(&mut buf, *ok);
                crate::wire::put_short_string(&mut buf, error);
                put_u32(&mut buf, *data_size);
                put_u32(&mut buf, *segments_amount);
                put_u32(&mut buf, *single_segment_size);
                if let ResponseSub::Delete { is_file } = sub {
                    put_bool(&mut buf, *is_file);
                }
            }
            Self::ReadyForDownloading { .. } | Self::DownloadCompleted { .. } | Self::Close { .. } => {}
            Self::Segment {
                segment_id,
                payload,
                ..
            } => {
                put_u32(&mut buf, *segment_id);
                put_u32(&mut buf, payload.len() as u32);
                buf.extend_from_slice(payload);
            }
            Self::Ack { segment_id, .. } => put_u32(&mut buf, *segment_id),
        }

        buf.freeze()
    }

    /// Parses a packet from its wire representation.
    ///
    /// Never panics; any truncated or inconsistent input yields
    /// [`MalformedPacket`] instead.
    pub fn decode(data: impl Into<Bytes>) -> Result<Self, MalformedPacket> {
        let mut buf: Bytes = data.into();

        let kind = Kind::from_u8(get_u8(&mut buf)?)?;
        let sub_kind = SubKind::from_u8(get_u8(&mut buf)?)?;
        let request_id = get_u32(&mut buf)?;

        let packet = match kind {
            Kind::Request => {
                let data_size = get_u32(&mut buf)?;
                let max_segment_size = get_u32(&mut buf)?;
                let anonymous = get_bool(&mut buf)?;
                let user_name = get_string(&mut buf)?;
                let password = get_string(&mut buf)?;
                let op = match sub_kind {
                    SubKind::Upload => RequestOp::Upload {
                        path: get_string(&mut buf)?,
                    },
                    SubKind::Download => RequestOp::Download {
                        path: get_string(&mut buf)?,
                    },
                    SubKind::List => {
                        let path = get_string(&mut buf)?;
                        let recursive = get_bool(&mut buf)?;
                        RequestOp::List { path, recursive }
                    }
                    SubKind::Delete => RequestOp::Delete {
                        path: get_string(&mut buf)?,
                    },
                    SubKind::Unknown => {
                        return Err(MalformedPacket::UnexpectedSubKind { kind, sub_kind });
                    }
                };
                Self::Request {
                    request_id,
                    data_size,
                    max_segment_size,
                    anonymous,
                    user_name,
                    password,
                    op,
                }
            }
            Kind::Response => {
                let ok = get_bool(&mut buf)?;
                let error = get_short_string(&mut buf)?;
                let data_size = get_u32(&mut buf)?;
                let segments_amount = get_u32(&mut buf)?;
                let single_segment_size = get_u32(&mut buf)?;
                let sub = match sub_kind {
                    SubKind::Unknown => ResponseSub::None,
                    SubKind::Delete => ResponseSub::Delete {
                        is_file: get_bool(&mut buf)?,
                    },
                    SubKind::Upload | SubKind::Download | SubKind::List => {
                        return Err(MalformedPacket::UnexpectedSubKind { kind, sub_kind });
                    }
                };
                Self::Response {
                    request_id,
                    ok,
                    error,
                    data_size,
                    segments_amount,
                    single_segment_size,
                    sub,
                }
            }
            Kind::ReadyForDownloading => Self::ReadyForDownloading { request_id },
            Kind::Segment => {
                let segment_id = get_u32(&mut buf)?;
                let len = get_u32(&mut buf)? as usize;
                let payload = get_bytes(&mut buf, len)?;
                Self::Segment {
                    request_id,
                    segment_id,
                    payload,
                }
            }
            Kind::Ack => Self::Ack {
                request_id,
                segment_id: get_u32(&mut buf)?,
            },
            Kind::DownloadCompleted => Self::DownloadCompleted { request_id },
            Kind::Close => Self::Close { request_id },
        };

        if !buf.is_empty() {
            return Err(MalformedPacket::TrailingBytes(buf.len()));
        }

        Ok(packet)
    }
}
