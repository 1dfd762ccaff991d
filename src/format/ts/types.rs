use std::time::Duration;

// PIDs
/// PID carrying the Program Association Table (PAT)
pub const PID_PAT: u16 = 0x0000;
/// Null packet PID; payloads on this PID are stuffing and are dropped
pub const PID_NULL: u16 = 0x1fff;
/// Exclusive upper bound of the 13-bit PID space
pub const PID_LIMIT: usize = 0x2000;

// Table IDs
/// Table ID for Program Association Table (PAT)
pub const TABLE_ID_PAT: u8 = 0x00;
/// Table ID for Program Map Table (PMT)
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
/// Stream type for AAC audio streams
pub const STREAM_TYPE_AAC: u8 = 0x0f;
/// Stream type for H.264 video streams
pub const STREAM_TYPE_H264: u8 = 0x1b;

// PES stream ids without an optional header
/// Padding stream; carries no optional PES header
pub const STREAM_ID_PADDING: u8 = 0xbe;
/// Private stream 2; carries no optional PES header
pub const STREAM_ID_PRIVATE_2: u8 = 0xbf;

// Constants
/// Size of a Transport Stream packet in bytes
pub const TS_PACKET_SIZE: usize = 188;
/// Sync byte that opens every TS packet
pub const TS_SYNC_BYTE: u8 = 0x47;
/// Clock frequency for Presentation Time Stamps (PTS) in Hz
pub const PTS_HZ: u64 = 90_000;

/// Converts a Presentation Time Stamp (PTS) value to a Duration
///
/// PTS uses a 90kHz clock for timing presentation of audio and video
/// frames.
///
/// # Arguments
///
/// * `pts` - PTS value to convert
///
/// # Returns
///
/// Duration representing the presentation time
pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos((pts * 1_000_000_000) / PTS_HZ)
}

/// Converts a Duration to a Presentation Time Stamp (PTS) value
///
/// Creates a PTS value suitable for MPEG-TS audio/video timing,
/// using the 90kHz PTS clock frequency.
///
/// # Arguments
///
/// * `time` - Duration to convert to PTS
///
/// # Returns
///
/// PTS value at 90kHz clock rate
pub fn time_to_pts(time: Duration) -> u64 {
    time.as_nanos() as u64 * PTS_HZ / 1_000_000_000
}
