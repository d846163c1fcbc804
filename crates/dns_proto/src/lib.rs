//! Codec for DNS messages (RFC 1035), including name compression.
//!
//! Like `dhcp_proto`, this is the format layer only: no resolver, no cache,
//! no socket loop.

mod error;
mod message;
mod name;

pub use error::MalformedPacket;
pub use message::{Flags, Message, Question, RData, ResourceRecord};
