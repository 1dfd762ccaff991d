//! # HTTP Live Streaming (HLS) Playback
//!
//! This module implements the consumer side of RFC 8216's core hierarchy:
//! a master playlist referencing media playlists, each of which enumerates
//! transport-stream segments.
//!
//! - [`master`]: master playlist container and line parser
//! - [`playlist`]: media playlist container and line parser
//! - [`session`]: the playback orchestrator driving playlist fetches,
//!   segment downloads, and the TS demuxer through a host-supplied
//!   [`StreamInput`](crate::av::StreamInput)
//!
//! Encryption, byte-range segments, discontinuities, and the low-latency
//! extensions are out of scope; unrecognized tags are ignored.

/// Master playlist container and parser
pub mod master;

/// Media playlist container and parser
pub mod playlist;

/// Playback session state machine
pub mod session;

pub use master::{HLSMasterPlaylist, HLSMasterPlaylistParser, PlaylistInfo, StreamInfo};
pub use playlist::{HLSPlaylist, HLSPlaylistParser, Segment};
pub use session::{EncodedUnit, HLSSession, SessionError};
