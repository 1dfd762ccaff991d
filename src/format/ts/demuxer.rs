//! Transport stream demultiplexer.
//!
//! [`TSDemuxer`] consumes 188-byte packets, routes payloads by PID, and
//! reassembles PSI sections and PES packets that straddle packet
//! boundaries. Elementary streams are materialized through the host's
//! [`StreamSink`] so that the buffering policy (where payload bytes land,
//! when a stream is considered delivered) stays outside the demuxer.

use bytes::BytesMut;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::av::{ElementaryStream, StreamType};
use crate::buffer::Buffer;
use crate::error::{DemuxioError, Result};

use super::pes::{pull_timecode, PTS_AND_DTS, PTS_DTS_MASK, PTS_ONLY};
use super::types::*;

/// Host callbacks materializing and tracking elementary streams.
///
/// The demuxer never allocates output: it asks the sink for a stream when
/// the PMT announces one, looks existing streams up while routing PES
/// payload, reports per-stream completion at end of segment, and offers
/// the sink a chance to re-home a stream whose buffer ran out.
pub trait StreamSink {
    /// Allocates a new output stream of the given type.
    ///
    /// Returning `None` surfaces as [`DemuxioError::OutOfMemory`].
    fn create_stream(
        &mut self,
        stream_type: StreamType,
        program_id: u16,
    ) -> Option<&mut ElementaryStream>;

    /// Looks up an existing stream by program and index.
    fn get_stream(&mut self, program_id: u16, index: u8) -> Option<&mut ElementaryStream>;

    /// Notifies that a segment's worth of payload has been delivered.
    fn finalize_stream(&mut self, program_id: u16, index: u8);

    /// Supplies a replacement stream after an overflow of `needed` bytes,
    /// or `None` to surface [`DemuxioError::StreamOverflow`].
    fn overflow_stream(
        &mut self,
        program_id: u16,
        index: u8,
        needed: usize,
    ) -> Option<&mut ElementaryStream>;
}

/// Counters accumulated over one demuxer read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    /// Packets whose sync byte checked out
    pub sync_count: usize,
    /// Packets dropped for a set transport-error indicator
    pub skip_count: usize,
}

/// A program announced by the PAT, with the streams its PMT declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Program number from the PAT entry
    pub program_id: u16,
    /// PID the program's PMT arrives on
    pub pmt_pid: u16,
    /// Sink-assigned indices of the program's materialized streams, in
    /// PMT declaration order
    pub stream_indices: Vec<u8>,
}

/// Reassembly state for one observed PID.
#[derive(Debug)]
struct PidNode {
    pid: u16,
    state: PidState,
}

#[derive(Debug)]
enum PidState {
    /// Seen in the packet stream but not yet classified by PSI
    Uninit,
    /// Carries PSI sections (PAT, or a PMT registered by the PAT)
    Psi(PsiState),
    /// Carries PES packets of a registered elementary stream
    Pes(PesState),
}

#[derive(Debug)]
struct PsiState {
    program_id: u16,
    table_id: u8,
    has_syntax: bool,
    section: Buffer,
}

#[derive(Debug)]
struct PesState {
    program_id: u16,
    index: u8,
    hdr_flags: u16,
    header: Buffer,
}

impl PidNode {
    fn new(pid: u16) -> Self {
        Self {
            pid,
            state: PidState::Uninit,
        }
    }

    fn is_psi(&self) -> bool {
        matches!(self.state, PidState::Psi(_))
    }

    fn is_pes(&self) -> bool {
        matches!(self.state, PidState::Pes(_))
    }

    /// Program id previously recorded by the PAT, if any. A PMT section
    /// start re-initializes the node's PSI state and must not lose it.
    fn psi_program_id(&self) -> u16 {
        match &self.state {
            PidState::Psi(psi) => psi.program_id,
            _ => 0,
        }
    }
}

/// One reassembly slot per possible 13-bit PID.
struct PidTable {
    slots: Vec<Option<Box<PidNode>>>,
}

impl PidTable {
    fn new() -> Self {
        Self {
            slots: (0..PID_LIMIT).map(|_| None).collect(),
        }
    }

    fn ensure(&mut self, pid: u16) -> &mut PidNode {
        self.slots[usize::from(pid)].get_or_insert_with(|| Box::new(PidNode::new(pid)))
    }

    fn take(&mut self, pid: u16) -> Option<Box<PidNode>> {
        self.slots[usize::from(pid)].take()
    }

    fn put(&mut self, pid: u16, node: Box<PidNode>) {
        self.slots[usize::from(pid)] = Some(node);
    }

    fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    fn pes_nodes(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.slots.iter().flatten().filter_map(|node| match &node.state {
            PidState::Pes(es) => Some((es.program_id, es.index)),
            _ => None,
        })
    }
}

/// MPEG-2 Transport Stream demultiplexer.
///
/// One instance demuxes one segment per [`read`](TSDemuxer::read) call;
/// parser state (PID classifications, counters) resets at the start of
/// each call, so PAT/PMT must be present in every segment, as HLS
/// requires.
pub struct TSDemuxer {
    packet: Buffer,
    pids: PidTable,
    programs: Vec<Program>,
    stats: DemuxStats,
}

impl Default for TSDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl TSDemuxer {
    /// Creates a demuxer with empty parser state.
    pub fn new() -> Self {
        Self {
            packet: Buffer::default(),
            pids: PidTable::new(),
            programs: Vec::new(),
            stats: DemuxStats::default(),
        }
    }

    /// Clears all per-segment parser state.
    pub fn reset(&mut self) {
        self.stats = DemuxStats::default();
        self.pids.clear();
        self.programs.clear();
    }

    /// Programs registered by the most recent read, in PAT order.
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Demuxes a fully buffered segment.
    ///
    /// Consumes `input` 188 bytes at a time until it is exhausted,
    /// dispatching payloads into `sink`. On success every registered PES
    /// stream is finalized and the packet counters are returned. An input
    /// that ends mid-packet yields [`DemuxioError::Truncated`].
    pub fn read(&mut self, input: &mut Buffer, sink: &mut dyn StreamSink) -> Result<DemuxStats> {
        self.begin();
        loop {
            self.packet.reset();
            let cnt = self.packet.pull_bytes_from(input, TS_PACKET_SIZE);
            if cnt == 0 {
                break;
            }
            if cnt < TS_PACKET_SIZE {
                return Err(DemuxioError::Truncated(format!(
                    "segment ended {cnt} bytes into a packet"
                )));
            }
            self.parse_packet(sink)?;
        }
        self.finalize_streams(sink);
        Ok(self.stats)
    }

    /// Demuxes a segment from an async byte stream.
    ///
    /// The streaming equivalent of [`read`](TSDemuxer::read): packets are
    /// staged 188 bytes at a time from `reader` until end of stream.
    pub async fn read_stream<R>(
        &mut self,
        reader: &mut R,
        sink: &mut dyn StreamSink,
    ) -> Result<DemuxStats>
    where
        R: AsyncRead + Unpin,
    {
        self.begin();
        let mut chunk = BytesMut::with_capacity(TS_PACKET_SIZE);
        chunk.resize(TS_PACKET_SIZE, 0);
        loop {
            let mut filled = 0;
            while filled < TS_PACKET_SIZE {
                let n = reader.read(&mut chunk[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            if filled < TS_PACKET_SIZE {
                return Err(DemuxioError::Truncated(format!(
                    "stream ended {filled} bytes into a packet"
                )));
            }
            self.packet.reset();
            self.packet.push_bytes(&chunk);
            self.parse_packet(sink)?;
        }
        self.finalize_streams(sink);
        Ok(self.stats)
    }

    fn begin(&mut self) {
        if self.packet.capacity() < TS_PACKET_SIZE {
            self.packet = Buffer::with_capacity(TS_PACKET_SIZE);
        }
        self.reset();
    }

    fn finalize_streams(&mut self, sink: &mut dyn StreamSink) {
        let streams: Vec<(u16, u8)> = self.pids.pes_nodes().collect();
        for (program_id, index) in streams {
            sink.finalize_stream(program_id, index);
        }
    }

    /// Parses exactly one staged 188-byte packet.
    fn parse_packet(&mut self, sink: &mut dyn StreamSink) -> Result<()> {
        let byte = self.packet.pull_byte();
        if byte != TS_SYNC_BYTE {
            return Err(DemuxioError::InvalidPacket(format!(
                "bad sync byte 0x{byte:02x}"
            )));
        }
        self.stats.sync_count += 1;

        let word = self.packet.pull_u16();
        let pid = word & 0x1fff;
        let payload_unit_start = word & 0x4000 != 0;
        let transport_error = word & 0x8000 != 0;

        if transport_error {
            self.stats.skip_count += 1;
            debug!("dropping transport-error packet on pid {pid:#06x}");
            return Ok(());
        }

        let flags = self.packet.pull_byte();
        let adaptation_field_exists = flags & 0x20 != 0;
        let has_payload = flags & 0x10 != 0;

        if pid == PID_NULL || !has_payload {
            return Ok(());
        }

        if adaptation_field_exists {
            // PCR and splice fields are not surfaced; skip the whole field
            let length = self.packet.pull_byte();
            self.packet.skip(usize::from(length));
            if self.packet.overflow() {
                return Err(DemuxioError::InvalidPacket(
                    "adaptation field exceeds packet".to_string(),
                ));
            }
        }

        let node_is_psi = self.pids.ensure(pid).is_psi();
        if pid == PID_PAT || node_is_psi {
            let Some(mut node) = self.pids.take(pid) else {
                return Err(DemuxioError::Internal("pid node vanished".to_string()));
            };
            let result = Self::parse_payload_psi(
                &mut self.packet,
                &mut node,
                &mut self.pids,
                &mut self.programs,
                payload_unit_start,
                sink,
            );
            self.pids.put(pid, node);
            result
        } else if self.pids.ensure(pid).is_pes() {
            let node = self.pids.ensure(pid);
            Self::parse_payload_pes(&mut self.packet, node, payload_unit_start, sink)
        } else {
            Ok(())
        }
    }

    /// Accumulates PSI section bytes on the PID node and interprets the
    /// section once it is complete.
    fn parse_payload_psi(
        packet: &mut Buffer,
        node: &mut PidNode,
        pids: &mut PidTable,
        programs: &mut Vec<Program>,
        start: bool,
        sink: &mut dyn StreamSink,
    ) -> Result<()> {
        if start {
            // the pointer field offsets the start of the table data
            let pointer = packet.pull_byte();
            packet.skip(usize::from(pointer));
            if packet.overflow() {
                return Err(DemuxioError::InvalidPacket(
                    "PSI pointer field exceeds packet".to_string(),
                ));
            }

            let table_id = packet.pull_byte();
            let section_header = packet.pull_u16();
            if section_header & 0x3000 != 0x3000 {
                return Err(DemuxioError::InvalidPacket(format!(
                    "bad PSI section header {section_header:#06x}"
                )));
            }
            let has_syntax = section_header & 0x8000 != 0;
            let section_length = usize::from(section_header & 0x03ff);

            trace!(
                "pid {:#06x}: table {table_id:#04x}, section length {section_length}",
                node.pid
            );
            node.state = PidState::Psi(PsiState {
                program_id: node.psi_program_id(),
                table_id,
                has_syntax,
                section: Buffer::with_capacity(section_length),
            });
        }

        let PidState::Psi(psi) = &mut node.state else {
            return Err(DemuxioError::Internal(
                "PSI payload on unclassified pid".to_string(),
            ));
        };

        let wanted = packet.size().min(psi.section.available());
        let pulled = psi.section.pull_bytes_from(packet, wanted);
        if pulled != wanted {
            return Err(DemuxioError::Internal(
                "PSI section copy came up short".to_string(),
            ));
        }

        if psi.section.available() > 0 {
            return Ok(()); // expecting more data
        }

        Self::interpret_section(node, pids, programs, sink)
    }

    /// Walks a complete PSI section: syntax preamble, table body, CRC.
    fn interpret_section(
        node: &mut PidNode,
        pids: &mut PidTable,
        programs: &mut Vec<Program>,
        sink: &mut dyn StreamSink,
    ) -> Result<()> {
        let PidState::Psi(psi) = &mut node.state else {
            return Err(DemuxioError::Internal(
                "section interpretation on non-PSI pid".to_string(),
            ));
        };

        if !psi.has_syntax {
            return Err(DemuxioError::UnsupportedTable(psi.table_id));
        }

        // table-id extension: transport stream id for the PAT, program
        // number for a PMT
        let table_id_ext = psi.section.pull_u16();
        let byte = psi.section.pull_byte();
        if byte & 0xc0 != 0xc0 {
            return Err(DemuxioError::InvalidPacket(format!(
                "bad PSI syntax flags {byte:#04x}"
            )));
        }
        if byte & 0x01 != 0x01 {
            // current_next_indicator clear: a next-version table
            return Err(DemuxioError::UnsupportedTable(psi.table_id));
        }
        psi.section.skip(2); // section number / last section number

        match psi.table_id {
            TABLE_ID_PAT => {
                // 4-byte PAT entries up to the trailing CRC-32
                let entries = psi.section.size().saturating_sub(4) / 4;
                for _ in 0..entries {
                    Self::parse_section_pat(&mut psi.section, pids, programs)?;
                }
            }
            TABLE_ID_PMT => {
                Self::parse_section_pmt(&mut psi.section, table_id_ext, pids, programs, sink)?;
            }
            other => return Err(DemuxioError::UnsupportedTable(other)),
        }

        debug_assert_eq!(psi.section.size(), 4);
        psi.section.skip(4); // TODO: verify the CRC-32 instead of skipping it
        Ok(())
    }

    /// Registers one PAT entry: a program and the PID its PMT arrives on.
    fn parse_section_pat(
        section: &mut Buffer,
        pids: &mut PidTable,
        programs: &mut Vec<Program>,
    ) -> Result<()> {
        let program_number = section.pull_u16();
        let program_pid = section.pull_u16();
        if program_pid & 0xe000 != 0xe000 {
            return Err(DemuxioError::InvalidPacket(format!(
                "bad PAT entry pid {program_pid:#06x}"
            )));
        }
        let program_pid = program_pid & 0x1fff;

        debug!("program {program_number} on pmt pid {program_pid:#06x}");

        let pmt_node = pids.ensure(program_pid);
        pmt_node.state = PidState::Psi(PsiState {
            program_id: program_number,
            table_id: 0,
            has_syntax: false,
            section: Buffer::default(),
        });

        if !programs.iter().any(|p| p.program_id == program_number) {
            programs.push(Program {
                program_id: program_number,
                pmt_pid: program_pid,
                stream_indices: Vec::new(),
            });
        }
        Ok(())
    }

    /// Walks a PMT's elementary-stream loop, materializing supported
    /// streams through the sink.
    fn parse_section_pmt(
        section: &mut Buffer,
        program_id: u16,
        pids: &mut PidTable,
        programs: &mut Vec<Program>,
        sink: &mut dyn StreamSink,
    ) -> Result<()> {
        let pcr_pid = section.pull_u16();
        let program_info_length = section.pull_u16();
        if pcr_pid & 0xe000 != 0xe000 {
            return Err(DemuxioError::InvalidPacket(format!(
                "bad PCR pid {pcr_pid:#06x}"
            )));
        }
        if program_info_length & 0xf000 != 0xf000 {
            return Err(DemuxioError::InvalidPacket(
                "bad program info length".to_string(),
            ));
        }
        section.skip(usize::from(program_info_length & 0x03ff));

        // elementary stream loop; 4 trailing bytes are the CRC-32
        while section.size() > 4 {
            let stream_type = section.pull_byte();
            let stream_pid = section.pull_u16();
            if stream_pid & 0xe000 != 0xe000 {
                return Err(DemuxioError::InvalidPacket(format!(
                    "bad elementary pid {stream_pid:#06x}"
                )));
            }
            let stream_pid = stream_pid & 0x1fff;

            let es_info_length = section.pull_u16() & 0x03ff;
            section.skip(usize::from(es_info_length));

            let Some(supported) = StreamType::from_stream_type(stream_type) else {
                debug!("skipping unsupported stream type {stream_type:#04x} on pid {stream_pid:#06x}");
                continue;
            };

            let node = pids.ensure(stream_pid);
            match node.state {
                PidState::Uninit => {
                    node.state = PidState::Pes(PesState {
                        program_id,
                        index: 0,
                        hdr_flags: 0,
                        header: Buffer::default(),
                    });
                }
                PidState::Pes(_) => {}
                PidState::Psi(_) => {
                    warn!("pmt declares elementary stream on PSI pid {stream_pid:#06x}");
                    continue;
                }
            }
            let PidState::Pes(es) = &mut node.state else {
                return Err(DemuxioError::Internal("pes node just created".to_string()));
            };

            let index = match sink.get_stream(es.program_id, es.index) {
                Some(stream) => stream.index(),
                None => {
                    let Some(stream) = sink.create_stream(supported, es.program_id) else {
                        return Err(DemuxioError::OutOfMemory);
                    };
                    debug!(
                        "created {supported:?} stream {:#04x} for program {program_id}",
                        stream.index()
                    );
                    stream.index()
                }
            };
            es.index = index;

            if let Some(program) = programs.iter_mut().find(|p| p.program_id == program_id) {
                if !program.stream_indices.contains(&index) {
                    program.stream_indices.push(index);
                }
            }
        }

        if section.size() == 4 {
            Ok(())
        } else {
            Err(DemuxioError::InvalidPacket(
                "PMT stream loop misaligned".to_string(),
            ))
        }
    }

    /// Reassembles PES header bytes and forwards payload to the stream.
    fn parse_payload_pes(
        packet: &mut Buffer,
        node: &mut PidNode,
        start: bool,
        sink: &mut dyn StreamSink,
    ) -> Result<()> {
        let PidState::Pes(es) = &mut node.state else {
            return Err(DemuxioError::Internal(
                "PES payload on unclassified pid".to_string(),
            ));
        };

        // silently drop payload until the PMT has materialized the stream
        if sink.get_stream(es.program_id, es.index).is_none() {
            return Ok(());
        }

        let mut frame_begin = start;

        if start {
            let start_code = packet.pull_u32();
            if start_code & 0xffff_ff00 != 0x0000_0100 {
                return Err(DemuxioError::InvalidPacket(format!(
                    "bad PES start code {start_code:#010x}"
                )));
            }
            let stream_id = (start_code & 0xff) as u8;
            if let Some(stream) = sink.get_stream(es.program_id, es.index) {
                stream.update_stream_id(stream_id);
            }
            packet.skip(2); // PES packet length, unvalidated

            // padding and private-2 streams carry no optional header
            if stream_id != STREAM_ID_PADDING && stream_id != STREAM_ID_PRIVATE_2 {
                let header_flags = packet.pull_u16();
                if header_flags & 0xc000 != 0x8000 {
                    return Err(DemuxioError::InvalidPacket(format!(
                        "bad PES header marker {header_flags:#06x}"
                    )));
                }
                if header_flags & 0x3000 != 0x0000 {
                    return Err(DemuxioError::InvalidPacket(
                        "scrambled PES payload".to_string(),
                    ));
                }
                es.hdr_flags = header_flags;

                let header_length = usize::from(packet.pull_byte());
                if header_length > 0 {
                    // sized exactly: completion is detected by available()
                    es.header = Buffer::with_capacity(header_length);
                }
            }
        }

        if es.header.available() > 0 {
            frame_begin = true;
            es.header.pull_bytes_from(packet, es.header.available());
            if es.header.available() > 0 {
                return Ok(()); // header still straddles packets
            }

            match es.hdr_flags & PTS_DTS_MASK {
                PTS_ONLY => {
                    let pts = pull_timecode(&mut es.header);
                    if let Some(stream) = sink.get_stream(es.program_id, es.index) {
                        stream.update_pts(pts);
                    }
                }
                PTS_AND_DTS => {
                    let pts = pull_timecode(&mut es.header);
                    let dts = pull_timecode(&mut es.header);
                    if let Some(stream) = sink.get_stream(es.program_id, es.index) {
                        stream.update_pts_dts(pts, dts);
                    }
                }
                _ => {}
            }
        }

        let len = packet.size();
        let (program_id, index) = (es.program_id, es.index);
        let Some(stream) = sink.get_stream(program_id, index) else {
            return Ok(());
        };
        let overflow = stream.append_payload(packet, len, frame_begin);
        if overflow > 0 {
            // the sink may re-home the stream; otherwise surface the error
            match sink.overflow_stream(program_id, index, overflow) {
                Some(replacement) => {
                    let still_over = replacement.append_payload(packet, len, frame_begin);
                    if still_over > 0 {
                        return Err(DemuxioError::StreamOverflow { needed: still_over });
                    }
                }
                None => return Err(DemuxioError::StreamOverflow { needed: overflow }),
            }
        }

        Ok(())
    }
}
