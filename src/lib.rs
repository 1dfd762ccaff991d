#![doc(html_root_url = "https://docs.rs/demuxio/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # demuxio - MPEG-TS demuxing and HLS playback toolkit
//!
//! `demuxio` ingests MPEG-2 Transport Streams (ISO/IEC 13818-1) and
//! reconstructs the elementary streams they carry. On top of the demuxer
//! sits an HTTP Live Streaming (RFC 8216) playback orchestrator that walks
//! a master playlist, fetches media playlists and segments through a
//! host-supplied input capability, and fills application-owned buffers
//! with frame-aligned encoded data.
//!
//! ## Features
//!
//! ### Transport stream demuxing
//! - 188-byte TS packet framing with PID routing
//! - PAT/PMT section reassembly across packet boundaries
//! - PES reassembly with PTS/DTS extraction
//! - H.264 access-unit boundary detection with per-unit timestamps
//!
//! ### HLS playback
//! - Master and media playlist parsing
//! - Cooperative, poll-driven segment download and demux pipeline
//! - Double-buffered elementary-stream output over host-supplied memory
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! demuxio = "0.1.0"
//! ```
//!
//! ### Parsing a media playlist
//!
//! ```rust
//! use demuxio::format::hls::{HLSPlaylist, HLSPlaylistParser};
//!
//! # fn main() -> demuxio::Result<()> {
//! let mut playlist = HLSPlaylist::new("prog_index.m3u8");
//! let mut parser = HLSPlaylistParser::new();
//! for line in "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:9.009,\nseg0.ts\n".lines() {
//!     parser.parse_line(&mut playlist, line)?;
//! }
//! parser.finish(&mut playlist);
//! assert_eq!(playlist.segment_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ### Demuxing a transport stream segment
//!
//! The demuxer materializes elementary streams through a [`StreamSink`]
//! implemented by the host (the HLS session provides one that manages the
//! double-buffer policy). See `demos/ts_dump.rs` for a complete sink that
//! writes each elementary stream to disk.
//!
//! ```rust,no_run
//! use demuxio::buffer::Buffer;
//! use demuxio::format::ts::TSDemuxer;
//! # struct MySink;
//! # impl demuxio::format::ts::StreamSink for MySink {
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
//! let segment = std::fs::read("fileSequence0.ts")?;
//! let mut input = Buffer::from_vec(segment);
//! let mut sink = MySink;
//! let mut demuxer = TSDemuxer::new();
//! let stats = demuxer.read(&mut input, &mut sink)?;
//! println!("parsed {} packets", stats.sync_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `buffer`: byte-window substrate shared by every parser
//!   - Owned regions and borrowed sub-windows with independent cursors
//!   - Overflow-sticky big-endian pull primitives
//!
//! - `av`: elementary-stream model and host-facing capabilities
//!   - [`av::ElementaryStream`] with its access-unit list
//!   - [`av::StreamInput`] non-blocking input capability
//!
//! - `codec`: codec-level parsing
//!   - H.264 NAL unit types and access-unit boundary scanning
//!
//! - `format`: container and streaming protocol implementations
//!   - TS packet/PSI/PES demuxing
//!   - HLS playlists and the playback session
//!
//! - `error`: error types and utilities
//!
//! [`StreamSink`]: format::ts::StreamSink

/// Audio/Video stream model and host-facing capabilities
pub mod av;

/// Byte-window buffer substrate
pub mod buffer;

/// Codec-level parsers (H.264 NAL units and access units)
pub mod codec;

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Media format implementations (MPEG-TS, HLS)
pub mod format;

pub use error::{DemuxioError, Result};
