//! # MPEG Transport Stream (TS) Demuxing
//!
//! This module reconstructs the contents of an MPEG-2 Transport Stream
//! (ISO/IEC 13818-1):
//!
//! - 188-byte TS packet framing and PID routing
//! - Program Specific Information (PSI) table reassembly: PAT and PMT
//! - Packetized Elementary Stream (PES) reassembly with PTS/DTS
//! - Elementary stream materialization through a host-supplied sink
//!
//! ## Core Flow
//!
//! The [`TSDemuxer`] consumes a segment's bytes one packet at a time. PSI
//! sections register programs and their elementary streams; PES payloads
//! are appended to [`ElementaryStream`] objects the host's [`StreamSink`]
//! materializes on demand. Supported stream types are AAC audio (`0x0f`)
//! and H.264 video (`0x1b`); everything else is skipped.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use demuxio::buffer::Buffer;
//! use demuxio::format::ts::TSDemuxer;
//! # struct NullSink;
//! # impl demuxio::format::ts::StreamSink for NullSink {
//! #     fn create_stream(&mut self, _: demuxio::av::StreamType, _: u16)
//! #         -> Option<&mut demuxio::av::ElementaryStream> { None }
//! #     fn get_stream(&mut self, _: u16, _: u8)
//! #         -> Option<&mut demuxio::av::ElementaryStream> { None }
//! #     fn finalize_stream(&mut self, _: u16, _: u8) {}
//! #     fn overflow_stream(&mut self, _: u16, _: u8, _: usize)
//! #         -> Option<&mut demuxio::av::ElementaryStream> { None }
//! # }
//!
//! # fn main() -> demuxio::Result<()> {
//! let mut demuxer = TSDemuxer::new();
//! let mut sink = NullSink;
//! let mut segment = Buffer::from_vec(std::fs::read("segment.ts")?);
//! demuxer.read(&mut segment, &mut sink)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`ElementaryStream`]: crate::av::ElementaryStream

/// TS demuxer implementation: packet parsing, PSI and PES reassembly
pub mod demuxer;

/// PES optional-header interpretation helpers
pub mod pes;

/// Core TS constants and timestamp conversions
pub mod types;

// Re-export commonly used types and constants
pub use demuxer::{DemuxStats, Program, StreamSink, TSDemuxer};
pub use types::{
    PID_NULL,
    PID_PAT,
    STREAM_TYPE_AAC,
    STREAM_TYPE_H264,
    TS_PACKET_SIZE,
};
