//! # Error Types
//!
//! This module provides the error types used throughout the demuxio
//! library. It defines a central error type `DemuxioError` that
//! encapsulates all failures that can surface while demuxing transport
//! streams or driving HLS playback.
//!
//! ## Example Usage
//!
//! ```rust
//! use demuxio::error::{DemuxioError, Result};
//!
//! fn check_sync(packet: &[u8]) -> Result<()> {
//!     if packet.first() != Some(&0x47) {
//!         return Err(DemuxioError::InvalidPacket("missing sync byte".to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Primary error type for the demuxio library
#[derive(Error, Debug)]
pub enum DemuxioError {
    /// I/O errors that occur during file or network operations
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The input ended in the middle of a 188-byte transport packet
    #[error("truncated input: {0}")]
    Truncated(String),

    /// A transport packet or PES/PSI payload violated the wire format
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// A stream output slot could not be produced by the host
    #[error("out of stream memory")]
    OutOfMemory,

    /// An elementary stream buffer ran out of space and the host declined
    /// to supply a replacement
    #[error("stream overflow: {needed} bytes over capacity")]
    StreamOverflow {
        /// Number of bytes that did not fit in the output buffer
        needed: usize,
    },

    /// A PSI table type outside the supported set was encountered
    #[error("unsupported table: 0x{0:02x}")]
    UnsupportedTable(u8),

    /// A feature within the transport stream is not supported
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An HLS playlist could not be interpreted
    #[error("playlist error: {0}")]
    Playlist(String),

    /// Errors that occur during integer parsing
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    /// Errors that occur during float parsing
    #[error("parse float error: {0}")]
    ParseFloat(#[from] ParseFloatError),

    /// Unknown (internal) error
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for demuxio operations.
///
/// This type is used throughout the demuxio library to handle operations
/// that can produce a `DemuxioError`.
pub type Result<T> = std::result::Result<T, DemuxioError>;
