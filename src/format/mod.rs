//! Media format implementations.
//!
//! - [`ts`]: MPEG-2 Transport Stream demuxing (packet framing, PSI tables,
//!   PES reassembly)
//! - [`hls`]: HTTP Live Streaming playlists and the playback session that
//!   ties playlist fetching to the TS demuxer

pub mod hls;
pub mod ts;

pub use self::hls::{HLSMasterPlaylist, HLSPlaylist, HLSSession};
pub use self::ts::{StreamSink, TSDemuxer};
