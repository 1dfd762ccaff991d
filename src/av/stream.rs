//! Elementary stream containers.
//!
//! An [`ElementaryStream`] owns a payload window (a sub-buffer of the
//! host-supplied video or audio region), the most recent PTS/DTS observed
//! in the PES headers feeding it, and, for H.264, the list of access
//! units found so far. Payload arrives through `append_payload` as the
//! PES reassembler drains transport packets; the access-unit scanner runs
//! incrementally over each freshly appended span so that every emitted
//! unit is stamped with the timestamps in effect when its bytes arrived.

use std::cell::Ref;

use log::trace;

use crate::buffer::Buffer;
use crate::codec::h264::AccessUnitScanner;

use super::StreamType;

/// One coded access unit within an elementary stream's payload window.
///
/// `offset` and `len` locate the unit relative to the window start; the
/// bytes stay valid for as long as the owning stream keeps its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnit {
    /// Byte offset of the unit within the stream's payload window
    pub offset: usize,
    /// Length of the unit in bytes
    pub len: usize,
    /// Presentation timestamp (90 kHz) in effect when the unit arrived
    pub pts: u64,
    /// Decode timestamp (90 kHz) in effect when the unit arrived
    pub dts: u64,
}

/// A demultiplexed elementary stream.
///
/// Created by the host's stream sink when the PMT announces a supported
/// stream type, filled by the PES reassembler, and finalized when a
/// segment's worth of payload has been delivered.
#[derive(Debug)]
pub struct ElementaryStream {
    buffer: Buffer,
    stream_type: StreamType,
    program_id: u16,
    index: u8,
    stream_id: u8,
    pts: u64,
    dts: u64,
    access_units: Vec<AccessUnit>,
    scanner: AccessUnitScanner,
}

impl ElementaryStream {
    /// Creates a stream writing into `buffer`.
    ///
    /// `program_id` is the owning program and `index` the sink-assigned
    /// stream index used for routing (`0x01..=0x7f` video, `0x80..=0xff`
    /// audio).
    pub fn new(buffer: Buffer, stream_type: StreamType, program_id: u16, index: u8) -> Self {
        Self {
            buffer,
            stream_type,
            program_id,
            index,
            stream_id: 0,
            pts: 0,
            dts: 0,
            access_units: Vec::new(),
            scanner: AccessUnitScanner::new(),
        }
    }

    /// The stream's content type.
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Identifier of the owning program.
    pub fn program_id(&self) -> u16 {
        self.program_id
    }

    /// Sink-assigned stream index.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Stream id from the most recent PES header.
    pub fn stream_id(&self) -> u8 {
        self.stream_id
    }

    /// Most recent presentation timestamp (90 kHz).
    pub fn pts(&self) -> u64 {
        self.pts
    }

    /// Most recent decode timestamp (90 kHz).
    pub fn dts(&self) -> u64 {
        self.dts
    }

    /// Records the PES stream id.
    pub fn update_stream_id(&mut self, stream_id: u8) {
        self.stream_id = stream_id;
    }

    /// Records a PTS-only header; DTS follows PTS in that case.
    pub fn update_pts(&mut self, pts: u64) {
        self.pts = pts;
        self.dts = pts;
    }

    /// Records a PTS+DTS header.
    pub fn update_pts_dts(&mut self, pts: u64, dts: u64) {
        self.pts = pts;
        self.dts = dts;
    }

    /// Appends `len` bytes pulled from `source` to the payload window.
    ///
    /// Returns the overflow amount: 0 when everything fit, otherwise the
    /// number of bytes the window is short by. On overflow nothing is
    /// consumed from `source` and the caller may retry against a
    /// replacement stream. For H.264 streams the access-unit scanner runs
    /// over the appended span before returning.
    pub fn append_payload(&mut self, source: &mut Buffer, len: usize, frame_begin: bool) -> usize {
        if len > self.buffer.available() {
            return len - self.buffer.available();
        }
        if len == 0 {
            return 0;
        }

        trace!(
            "es {:#04x}: +{} bytes{}",
            self.index,
            len,
            if frame_begin { " (frame begin)" } else { "" }
        );

        let pulled = self.buffer.pull_bytes_from(source, len);
        debug_assert_eq!(pulled, len);

        if self.stream_type.is_video() {
            self.scan_access_units();
        }

        0
    }

    /// Flushes the in-progress access unit at end-of-segment.
    pub fn finish(&mut self) {
        if !self.stream_type.is_video() {
            return;
        }
        let end = self.buffer.size();
        if let Some((offset, len)) = self.scanner.flush(end) {
            self.access_units.push(AccessUnit {
                offset,
                len,
                pts: self.pts,
                dts: self.dts,
            });
        }
    }

    /// Number of access units found so far.
    pub fn access_unit_count(&self) -> usize {
        self.access_units.len()
    }

    /// The `index`-th access unit, in emission order.
    pub fn access_unit(&self, index: usize) -> Option<&AccessUnit> {
        self.access_units.get(index)
    }

    /// Borrows the payload bytes of an access unit.
    pub fn access_unit_data(&self, unit: &AccessUnit) -> Ref<'_, [u8]> {
        self.buffer.window(unit.offset, unit.len)
    }

    /// Borrows the whole payload received so far.
    pub fn payload(&self) -> Ref<'_, [u8]> {
        self.buffer.readable()
    }

    /// Bytes of payload received so far.
    pub fn payload_len(&self) -> usize {
        self.buffer.size()
    }

    fn scan_access_units(&mut self) {
        let mut closed: Vec<(usize, usize)> = Vec::new();
        {
            let window = self.buffer.readable();
            self.scanner.scan(&window, &mut closed);
        }
        // every unit closed by this append shares the current timestamps
        for (offset, len) in closed {
            self.access_units.push(AccessUnit {
                offset,
                len,
                pts: self.pts,
                dts: self.dts,
            });
        }
    }
}
