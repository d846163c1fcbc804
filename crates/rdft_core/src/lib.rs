//! Request handling, congestion control, storage, and auth for the Reliable
//! Datagram File Transfer protocol.
//!
//! `rdft_net` gets bytes on and off the wire; `rdft_proto` turns those bytes
//! into [`rdft_proto::Packet`]s; this crate is where a decoded packet turns
//! into filesystem actions and an eventual reply.

pub mod auth;
pub mod config;
pub mod cubic;
pub mod download;
pub mod error;
pub mod list_codec;
pub mod registry;
pub mod sink;
pub mod storage;
pub mod upload;
mod workpool;

pub use config::Config;
pub use cubic::CongestionWindow;
pub use error::RdftError;
pub use registry::Registry;
pub use sink::{PacketSink, SharedTransportSink};
