//! Codec for DHCP/BOOTP packets (RFC 2131 header, RFC 2132 options).
//!
//! This crate is the format layer only: encode/decode and nothing else.
//! There is no lease database, no socket loop, no retransmission — see
//! `rdft_net`/`rdft_core` for what a full request/response service built on
//! a codec like this one looks like.

mod error;
mod options;
mod packet;
mod wire;

pub use error::MalformedPacket;
pub use options::{DhcpOption, MessageType};
pub use packet::{MAGIC_COOKIE, Op, Packet};
