//! Incremental access-unit boundary scanner.
//!
//! Walks an Annex B byte stream for `00 00 01` start codes and cuts the
//! stream into access units, approximating Figure 7-1 of ITU-T H.264
//! (2012): a frame carries its non-VCL units (delimiter, parameter sets,
//! SEI) first, followed by its coded slices. A non-VCL unit therefore
//! opens a new unit when none is in progress and closes the current one
//! when it follows the frame's slices; a slice with `first_mb_in_slice`
//! set does the same when no non-VCL prefix preceded it.
//!
//! The scanner never unreads: it holds a cursor into the stream and may be
//! called again whenever more bytes are appended after the cursor.

use super::NalUnitType;

/// Streaming scanner state for one elementary stream.
///
/// `scan` consumes newly appended bytes; `flush` closes the in-progress
/// unit at end-of-segment. Positions are byte offsets from the start of
/// the scanned stream.
#[derive(Debug, Default)]
pub struct AccessUnitScanner {
    cursor: usize,
    au_start: Option<usize>,
    vcl_pending: bool,
}

impl AccessUnitScanner {
    /// Creates a scanner positioned at the start of the stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans `window` (the whole stream so far) from the saved cursor,
    /// appending `(offset, len)` spans of closed access units to `closed`.
    ///
    /// The final 4 bytes are left unscanned until more data arrives; a
    /// start code needs its type byte and slice-header bit in view.
    pub fn scan(&mut self, window: &[u8], closed: &mut Vec<(usize, usize)>) {
        while self.cursor + 4 < window.len() {
            let hdr = &window[self.cursor..];
            if !(hdr[0] == 0 && hdr[1] == 0 && hdr[2] == 0x01) {
                self.cursor += 1;
                continue;
            }

            let nal = NalUnitType::from_u8(hdr[3]);
            let mut finish = false;
            if nal.bounds_access_unit() {
                if self.vcl_pending {
                    if nal.is_vcl() {
                        self.vcl_pending = false;
                    }
                } else if !nal.is_vcl() {
                    self.vcl_pending = true;
                    if self.au_start.is_none() {
                        self.au_start = Some(self.cursor);
                    } else {
                        finish = true;
                    }
                } else if hdr[4] & 0x80 != 0 {
                    // first_mb_in_slice: this slice opens a new picture
                    if self.au_start.is_none() {
                        self.au_start = Some(self.cursor);
                    } else {
                        finish = true;
                    }
                }
            }

            if finish {
                if let Some(start) = self.au_start.take() {
                    closed.push((start, self.cursor - start));
                }
                self.vcl_pending = false;
            }

            self.cursor += 4;
        }
    }

    /// Closes the pending access unit against the stream end, if any.
    ///
    /// Returns its `(offset, len)` span, never zero-length.
    pub fn flush(&mut self, end: usize) -> Option<(usize, usize)> {
        self.vcl_pending = false;
        let start = self.au_start.take()?;
        self.cursor = end;
        (end > start).then(|| (start, end - start))
    }
}
