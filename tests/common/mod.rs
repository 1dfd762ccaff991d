#![allow(dead_code)]

//! Shared fixtures: synthetic TS packet builders, an in-memory stream
//! input host, and a plain vector-backed stream sink.

use std::collections::HashMap;

use demuxio::av::{ElementaryStream, PollStatus, RequestHandle, ResourceHandle, StreamInput, StreamType};
use demuxio::buffer::Buffer;
use demuxio::format::ts::StreamSink;

pub const TS_PACKET_SIZE: usize = 188;
pub const SYNC_BYTE: u8 = 0x47;

/// Builds a TS packet, padding the tail with 0xff (fine for PSI payloads,
/// which carry their own length).
pub fn ts_packet(pid: u16, payload_unit_start: bool, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
    packet.push(SYNC_BYTE);
    let mut word = pid;
    if payload_unit_start {
        word |= 0x4000;
    }
    packet.extend_from_slice(&word.to_be_bytes());
    packet.push(0x10);
    packet.extend_from_slice(payload);
    packet.resize(TS_PACKET_SIZE, 0xff);
    packet
}

/// Builds a TS packet whose payload ends exactly at the packet boundary,
/// using adaptation-field stuffing up front (as PES packets require).
pub fn ts_packet_padded(pid: u16, payload_unit_start: bool, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 183);
    let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
    packet.push(SYNC_BYTE);
    let mut word = pid;
    if payload_unit_start {
        word |= 0x4000;
    }
    packet.extend_from_slice(&word.to_be_bytes());
    packet.push(0x30);
    let stuffing = 183 - payload.len();
    packet.push(stuffing as u8);
    if stuffing > 0 {
        packet.push(0x00);
        packet.extend_from_slice(&vec![0xff; stuffing - 1]);
    }
    packet.extend_from_slice(payload);
    assert_eq!(packet.len(), TS_PACKET_SIZE);
    packet
}

/// Single-program PAT on PID 0.
pub fn pat_packet(program: u16, pmt_pid: u16) -> Vec<u8> {
    let mut payload = vec![0x00, 0x00]; // pointer field, table id
    payload.extend_from_slice(&0xb00du16.to_be_bytes());
    payload.extend_from_slice(&0x0001u16.to_be_bytes());
    payload.push(0xc1);
    payload.extend_from_slice(&[0x00, 0x00]);
    payload.extend_from_slice(&program.to_be_bytes());
    payload.extend_from_slice(&(0xe000 | pmt_pid).to_be_bytes());
    payload.extend_from_slice(&[0; 4]);
    ts_packet(0x0000, true, &payload)
}

/// Raw PMT section bytes (pointer field + header + stream loop + CRC).
pub fn pmt_section(program: u16, entries: &[(u8, u16)]) -> Vec<u8> {
    let section_length = 9 + 5 * entries.len() + 4;
    assert!(section_length <= 0x3ff);
    let mut section = vec![0x00, 0x02]; // pointer field, table id
    section.extend_from_slice(&(0xb000 | section_length as u16).to_be_bytes());
    section.extend_from_slice(&program.to_be_bytes());
    section.push(0xc1);
    section.extend_from_slice(&[0x00, 0x00]);
    section.extend_from_slice(&0xe100u16.to_be_bytes());
    section.extend_from_slice(&0xf000u16.to_be_bytes());
    for &(stream_type, pid) in entries {
        section.push(stream_type);
        section.extend_from_slice(&(0xe000 | pid).to_be_bytes());
        section.extend_from_slice(&0xf000u16.to_be_bytes());
    }
    section.extend_from_slice(&[0; 4]);
    section
}

/// Single-packet PMT.
pub fn pmt_packet(pmt_pid: u16, program: u16, entries: &[(u8, u16)]) -> Vec<u8> {
    ts_packet(pmt_pid, true, &pmt_section(program, entries))
}

/// Encodes a 33-bit timecode into the 5-byte PES layout with prefix and
/// marker bits cleared.
pub fn encode_timecode(tc: u64) -> [u8; 5] {
    [
        (tc >> 29) as u8,
        ((tc >> 22) & 0x7f) as u8,
        (((tc >> 15) & 0x7f) << 1) as u8,
        ((tc >> 7) & 0xff) as u8,
        ((tc & 0x7f) << 1) as u8,
    ]
}

/// PES packet head: start code, unset length, flags, and timestamps.
pub fn pes_head(stream_id: u8, pts: Option<u64>, dts: Option<u64>) -> Vec<u8> {
    let mut head = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00];
    let (flags, header_len) = match (pts, dts) {
        (Some(_), Some(_)) => (0x80c0u16, 10u8),
        (Some(_), None) => (0x8080, 5),
        _ => (0x8000, 0),
    };
    head.extend_from_slice(&flags.to_be_bytes());
    head.push(header_len);
    if let Some(pts) = pts {
        head.extend_from_slice(&encode_timecode(pts));
    }
    if let Some(dts) = dts {
        head.extend_from_slice(&encode_timecode(dts));
    }
    head
}

/// Sink backed by plain owned buffers, one stream per create call.
pub struct VecSink {
    pub streams: Vec<ElementaryStream>,
    pub finalized: Vec<(u16, u8)>,
    next_index: u8,
    stream_capacity: usize,
}

impl VecSink {
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            streams: Vec::new(),
            finalized: Vec::new(),
            next_index: 1,
            stream_capacity,
        }
    }

    pub fn stream_by_type(&self, stream_type: StreamType) -> Option<&ElementaryStream> {
        self.streams.iter().find(|s| s.stream_type() == stream_type)
    }
}

impl StreamSink for VecSink {
    fn create_stream(
        &mut self,
        stream_type: StreamType,
        program_id: u16,
    ) -> Option<&mut ElementaryStream> {
        let index = self.next_index;
        self.next_index += 1;
        let region = Buffer::with_capacity(self.stream_capacity);
        self.streams.push(ElementaryStream::new(
            region.sub_buffer(0, self.stream_capacity),
            stream_type,
            program_id,
            index,
        ));
        self.streams.last_mut()
    }

    fn get_stream(&mut self, _program_id: u16, index: u8) -> Option<&mut ElementaryStream> {
        self.streams.iter_mut().find(|s| s.index() == index)
    }

    fn finalize_stream(&mut self, program_id: u16, index: u8) {
        if let Some(stream) = self.get_stream(program_id, index) {
            stream.finish();
        }
        self.finalized.push((program_id, index));
    }

    fn overflow_stream(
        &mut self,
        _program_id: u16,
        _index: u8,
        _needed: usize,
    ) -> Option<&mut ElementaryStream> {
        None
    }
}

enum Request {
    Open { resource: ResourceHandle, ticks: u32 },
    OpenFailed { ticks: u32 },
    Read { resource: ResourceHandle, dst: Option<Buffer>, ticks: u32 },
}

/// In-memory [`StreamInput`] host mapping URLs to byte blobs.
///
/// Every request reports `Pending` for a configurable number of polls
/// before completing, which exercises the session's suspension points.
pub struct MemoryStreamInput {
    resources: HashMap<String, Vec<u8>>,
    by_handle: HashMap<ResourceHandle, Vec<u8>>,
    requests: HashMap<RequestHandle, Request>,
    next_request: RequestHandle,
    next_resource: ResourceHandle,
    pending_ticks: u32,
    pub closed: Vec<ResourceHandle>,
}

impl MemoryStreamInput {
    pub fn new(pending_ticks: u32) -> Self {
        Self {
            resources: HashMap::new(),
            by_handle: HashMap::new(),
            requests: HashMap::new(),
            next_request: 1,
            next_resource: 1,
            pending_ticks,
            closed: Vec::new(),
        }
    }

    pub fn insert(&mut self, url: &str, data: Vec<u8>) {
        self.resources.insert(url.to_string(), data);
    }

    fn next_request_handle(&mut self) -> RequestHandle {
        let handle = self.next_request;
        self.next_request += 1;
        handle
    }
}

impl StreamInput for MemoryStreamInput {
    fn open(&mut self, url: &str) -> RequestHandle {
        let handle = self.next_request_handle();
        let request = match self.resources.get(url) {
            Some(data) => {
                let resource = self.next_resource;
                self.next_resource += 1;
                self.by_handle.insert(resource, data.clone());
                Request::Open {
                    resource,
                    ticks: self.pending_ticks,
                }
            }
            None => Request::OpenFailed {
                ticks: self.pending_ticks,
            },
        };
        self.requests.insert(handle, request);
        handle
    }

    fn size(&mut self, resource: ResourceHandle) -> usize {
        self.by_handle.get(&resource).map_or(0, Vec::len)
    }

    fn read(&mut self, resource: ResourceHandle, dst: Buffer) -> RequestHandle {
        let handle = self.next_request_handle();
        self.requests.insert(
            handle,
            Request::Read {
                resource,
                dst: Some(dst),
                ticks: self.pending_ticks,
            },
        );
        handle
    }

    fn take_buffer(&mut self, request: RequestHandle) -> Option<Buffer> {
        match self.requests.remove(&request) {
            Some(Request::Read { dst, .. }) => dst,
            _ => None,
        }
    }

    fn close(&mut self, resource: ResourceHandle) {
        self.closed.push(resource);
    }

    fn poll(&mut self, request: RequestHandle) -> PollStatus {
        let Some(state) = self.requests.get_mut(&request) else {
            return PollStatus::Invalid;
        };
        match state {
            Request::Open { resource, ticks } => {
                if *ticks > 0 {
                    *ticks -= 1;
                    return PollStatus::Pending;
                }
                PollStatus::Complete(*resource)
            }
            Request::OpenFailed { ticks } => {
                if *ticks > 0 {
                    *ticks -= 1;
                    return PollStatus::Pending;
                }
                PollStatus::Error
            }
            Request::Read { resource, dst, ticks } => {
                if *ticks > 0 {
                    *ticks -= 1;
                    return PollStatus::Pending;
                }
                let data = self.by_handle.get(resource).cloned().unwrap_or_default();
                if let Some(buffer) = dst.as_mut() {
                    if buffer.size() == 0 {
                        buffer.push_bytes(&data);
                    }
                }
                PollStatus::Complete(data.len() as u64)
            }
        }
    }
}
