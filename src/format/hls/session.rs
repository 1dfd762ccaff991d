//! HLS playback session.
//!
//! [`HLSSession`] ties the pieces together: it fetches the master
//! playlist through the host's [`StreamInput`], fetches every media
//! playlist it references, then walks the selected variant's segments,
//! handing each downloaded segment to the TS demuxer. Demuxed payload
//! lands in per-type rings of elementary streams carved out of the
//! host-supplied video and audio buffers (double-buffered by default:
//! one slot being written while the other is read).
//!
//! The session is a cooperative state machine: every call to
//! [`update`](HLSSession::update) polls the outstanding request or
//! advances one transition, and never blocks.

use std::cell::Ref;

use log::{debug, warn};

use crate::av::{
    ElementaryStream, MediaStream, PollStatus, RequestHandle, ResourceHandle, StreamInput,
    StreamType,
};
use crate::buffer::Buffer;
use crate::error::DemuxioError;
use crate::format::ts::{StreamSink, TSDemuxer};

use super::master::{HLSMasterPlaylist, HLSMasterPlaylistParser, StreamInfo};
use super::playlist::HLSPlaylistParser;

const DEFAULT_BUFFER_COUNT: usize = 2;

/// Terminal failure states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// No playable stream: the root playlist failed or was empty, or no
    /// media playlist could be fetched
    NoStream,
    /// The transport stream inside a segment could not be demuxed
    InStream,
    /// A buffer needed by the pipeline could not be produced
    Memory,
    /// Unknown (internal) error
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OpenRootList,
    ReadRootList,
    OpenMediaList,
    ReadMediaList,
    DownloadSegment,
    OpenSegment,
    ReadSegment,
    NoStreamError,
    InStreamError,
    MemoryError,
    InternalError,
}

/// Ring cursors over one stream type's buffer slots.
///
/// `write_to_idx` is the slot the demuxer fills next; `write_done_idx`
/// the slot most recently finalized; `read_from_idx`/`read_au_idx`
/// address the access unit the host pulls next. The ring is empty when
/// `read_from_idx == write_to_idx` and full when advancing the write
/// cursor would land on the read cursor with the current slot already
/// finalized.
#[derive(Debug, Clone, Copy)]
struct StreamPosition {
    read_from_idx: usize,
    read_au_idx: usize,
    write_to_idx: usize,
    write_done_idx: Option<usize>,
    buffer_count: usize,
}

impl StreamPosition {
    fn new(buffer_count: usize) -> Self {
        Self {
            read_from_idx: 0,
            read_au_idx: 0,
            write_to_idx: 0,
            write_done_idx: None,
            buffer_count,
        }
    }

    fn reset(&mut self, buffer_count: usize) {
        *self = Self::new(buffer_count);
    }

    fn has_write_space(&self) -> bool {
        (self.write_to_idx + 1) % self.buffer_count != self.read_from_idx
            || self.write_done_idx != Some(self.write_to_idx)
    }

    fn has_read_space(&self) -> bool {
        self.read_from_idx != self.write_to_idx
    }

    fn advance_read(&mut self) -> bool {
        if self.read_from_idx == self.write_to_idx {
            return false;
        }
        // reclaim the slot being freed when the writer is parked on a
        // finalized slot right behind the reader
        if self.write_done_idx == Some(self.write_to_idx)
            && (self.write_to_idx + 1) % self.buffer_count == self.read_from_idx
        {
            self.write_to_idx = self.read_from_idx;
        }
        self.read_from_idx = (self.read_from_idx + 1) % self.buffer_count;
        true
    }

    fn advance_write(&mut self) -> bool {
        self.write_done_idx = Some(self.write_to_idx);
        let next = (self.write_to_idx + 1) % self.buffer_count;
        if next == self.read_from_idx {
            return false;
        }
        self.write_to_idx = next;
        true
    }
}

/// One encoded access unit pulled from the session.
pub struct EncodedUnit<'a> {
    /// Presentation timestamp (90 kHz)
    pub pts: u64,
    /// Decode timestamp (90 kHz)
    pub dts: u64,
    /// The unit's bytes, borrowed from the owning stream's buffer
    pub data: Ref<'a, [u8]>,
}

/// Elementary-stream slots carved from the host buffers, plus the ring
/// cursors tracking which slot is written and which is read.
///
/// Implements [`StreamSink`]: the demuxer materializes streams into the
/// current write slot, and stream indices are assigned from disjoint
/// ranges so payload routing can tell the types apart (video
/// `0x01..=0x7f`, audio `0x80..=0xff`).
struct StreamBank {
    video_buffer: Buffer,
    audio_buffer: Buffer,
    video_streams: Vec<Option<ElementaryStream>>,
    audio_streams: Vec<Option<ElementaryStream>>,
    video_pos: StreamPosition,
    audio_pos: StreamPosition,
    video_es_index: u8,
    audio_es_index: u8,
    buffer_count: usize,
}

impl StreamBank {
    fn new(video_buffer: Buffer, audio_buffer: Buffer, buffer_count: usize) -> Self {
        let mut bank = Self {
            video_buffer,
            audio_buffer,
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
            video_pos: StreamPosition::new(buffer_count),
            audio_pos: StreamPosition::new(buffer_count),
            video_es_index: 0,
            audio_es_index: 0,
            buffer_count,
        };
        bank.reset();
        bank
    }

    fn reset(&mut self) {
        self.video_pos.reset(self.buffer_count);
        self.audio_pos.reset(self.buffer_count);
        self.video_es_index = 0;
        self.audio_es_index = 0;
        self.video_streams.clear();
        self.audio_streams.clear();
        self.video_streams.resize_with(self.buffer_count, || None);
        self.audio_streams.resize_with(self.buffer_count, || None);
    }

    fn pull(&mut self, video: bool) -> Option<EncodedUnit<'_>> {
        let (streams, pos) = if video {
            (&mut self.video_streams, &mut self.video_pos)
        } else {
            (&mut self.audio_streams, &mut self.audio_pos)
        };

        if !pos.has_read_space() {
            return None;
        }
        let slot = pos.read_from_idx;
        let count = streams[slot]
            .as_ref()
            .map_or(0, ElementaryStream::access_unit_count);

        let mut unit = None;
        if pos.read_au_idx < count {
            unit = streams[slot]
                .as_ref()
                .and_then(|es| es.access_unit(pos.read_au_idx))
                .copied();
            pos.read_au_idx += 1;
        }
        if pos.read_au_idx >= count && pos.advance_read() {
            pos.read_au_idx = 0;
        }

        let unit = unit?;
        let stream = streams[slot].as_ref()?;
        Some(EncodedUnit {
            pts: unit.pts,
            dts: unit.dts,
            data: stream.access_unit_data(&unit),
        })
    }
}

impl StreamSink for StreamBank {
    fn create_stream(
        &mut self,
        stream_type: StreamType,
        program_id: u16,
    ) -> Option<&mut ElementaryStream> {
        // each stream gets the current write slot's window of the host
        // buffer; slot reuse re-derives the same window
        match stream_type {
            StreamType::VideoH264 => {
                if self.video_es_index == 0 || self.video_es_index >= 0x80 {
                    self.video_es_index = 1;
                }
                let index = self.video_es_index;
                self.video_es_index = self.video_es_index.wrapping_add(1);

                let slot = self.video_pos.write_to_idx;
                let size = self.video_buffer.available() / self.buffer_count;
                let window = self.video_buffer.sub_buffer(slot * size, size);
                self.video_streams[slot] =
                    Some(ElementaryStream::new(window, stream_type, program_id, index));
                self.video_streams[slot].as_mut()
            }
            StreamType::AudioAac => {
                if self.audio_es_index < 0x80 {
                    self.audio_es_index = 0x80;
                }
                let index = self.audio_es_index;
                self.audio_es_index = self.audio_es_index.wrapping_add(1);

                let slot = self.audio_pos.write_to_idx;
                let size = self.audio_buffer.available() / self.buffer_count;
                let window = self.audio_buffer.sub_buffer(slot * size, size);
                self.audio_streams[slot] =
                    Some(ElementaryStream::new(window, stream_type, program_id, index));
                self.audio_streams[slot].as_mut()
            }
        }
    }

    fn get_stream(&mut self, _program_id: u16, index: u8) -> Option<&mut ElementaryStream> {
        if (0x01..0x80).contains(&index) {
            self.video_streams
                .iter_mut()
                .flatten()
                .find(|s| s.index() == index)
        } else if index >= 0x80 {
            self.audio_streams
                .iter_mut()
                .flatten()
                .find(|s| s.index() == index)
        } else {
            None
        }
    }

    fn finalize_stream(&mut self, program_id: u16, index: u8) {
        let Some(stream) = self.get_stream(program_id, index) else {
            return;
        };
        stream.finish();
        if index < 0x80 {
            self.video_pos.advance_write();
        } else {
            self.audio_pos.advance_write();
        }
    }

    fn overflow_stream(
        &mut self,
        program_id: u16,
        index: u8,
        needed: usize,
    ) -> Option<&mut ElementaryStream> {
        warn!("stream {index:#04x} of program {program_id} overflowed by {needed} bytes");
        None
    }
}

/// HLS playback orchestrator.
///
/// Construction issues the open request for the master playlist; the host
/// then calls [`update`](Self::update) until the session reports an error
/// or all segments are demuxed, pulling decoded-frame-ready access units
/// with [`pull_video`](Self::pull_video) / [`pull_audio`](Self::pull_audio)
/// along the way.
pub struct HLSSession<I: StreamInput> {
    input: I,
    state: State,
    request: RequestHandle,
    resource: ResourceHandle,
    master: HLSMasterPlaylist,
    parse_idx: usize,
    play_idx: Option<usize>,
    root_url: String,
    segment_index: usize,
    demuxer: TSDemuxer,
    bank: StreamBank,
}

impl<I: StreamInput> HLSSession<I> {
    /// Creates a session playing `url` and issues the root playlist open.
    ///
    /// `video_buffer` and `audio_buffer` are the host-supplied regions
    /// that elementary streams will be carved from; each is split into
    /// two sub-windows so one segment can be read while the next is
    /// written.
    pub fn new(mut input: I, video_buffer: Buffer, audio_buffer: Buffer, url: &str) -> Self {
        let request = input.open(url);

        // when the url ends in a filename, strip it to get the root
        let mut root_url = url.to_string();
        if let Some(slash) = root_url.rfind('/') {
            if root_url[slash..].contains('.') {
                root_url.truncate(slash + 1);
            }
        }

        Self {
            input,
            state: State::OpenRootList,
            request,
            resource: 0,
            master: HLSMasterPlaylist::new(),
            parse_idx: 0,
            play_idx: None,
            root_url,
            segment_index: 0,
            demuxer: TSDemuxer::new(),
            bank: StreamBank::new(video_buffer, audio_buffer, DEFAULT_BUFFER_COUNT),
        }
    }

    /// Overrides the number of ring slots per stream type (default 2).
    pub fn with_buffer_count(mut self, buffer_count: usize) -> Self {
        self.bank.buffer_count = buffer_count.max(1);
        self.bank.reset();
        self
    }

    /// The terminal error, if the session has failed.
    pub fn error(&self) -> Option<SessionError> {
        match self.state {
            State::NoStreamError => Some(SessionError::NoStream),
            State::InStreamError => Some(SessionError::InStream),
            State::MemoryError => Some(SessionError::Memory),
            State::InternalError => Some(SessionError::Internal),
            _ => None,
        }
    }

    /// True once every segment is demuxed and every access unit pulled.
    pub fn finished(&self) -> bool {
        let Some(play_idx) = self.play_idx else {
            return false;
        };
        self.segment_index >= self.master.entries()[play_idx].playlist.segment_count()
            && self.state == State::DownloadSegment
            && !self.bank.video_pos.has_read_space()
            && !self.bank.audio_pos.has_read_space()
    }

    /// The parsed master playlist.
    pub fn master_playlist(&self) -> &HLSMasterPlaylist {
        &self.master
    }

    /// The variant selected for playback, once media playlists are in.
    pub fn selected_stream(&self) -> Option<&StreamInfo> {
        self.play_idx.map(|idx| &self.master.entries()[idx])
    }

    /// Index of the segment the session will download next.
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// Pulls the next video access unit from the read slot, if any.
    pub fn pull_video(&mut self) -> Option<EncodedUnit<'_>> {
        self.bank.pull(true)
    }

    /// Pulls the next audio access unit from the read slot, if any.
    pub fn pull_audio(&mut self) -> Option<EncodedUnit<'_>> {
        self.bank.pull(false)
    }

    /// Advances the session state machine by at most one transition.
    pub fn update(&mut self) {
        match self.state {
            State::OpenRootList | State::OpenMediaList | State::OpenSegment => {
                self.update_open();
            }
            State::ReadRootList => self.update_read_root_list(),
            State::ReadMediaList => self.update_read_media_list(),
            State::DownloadSegment => self.update_download_segment(),
            State::ReadSegment => self.update_read_segment(),
            State::NoStreamError
            | State::InStreamError
            | State::MemoryError
            | State::InternalError => {}
        }
    }

    /// Shared handler for the three open states: once the open request
    /// completes, size the destination buffer and issue the read.
    fn update_open(&mut self) {
        match self.input.poll(self.request) {
            PollStatus::Complete(handle) => {
                self.resource = handle;
                let file_size = self.input.size(self.resource);
                if file_size == 0 {
                    self.fail_open();
                    return;
                }
                let dst = Buffer::with_capacity(file_size);
                self.request = self.input.read(self.resource, dst);
                self.state = match self.state {
                    State::OpenRootList => State::ReadRootList,
                    State::OpenMediaList => State::ReadMediaList,
                    State::OpenSegment => State::ReadSegment,
                    _ => State::InternalError,
                };
            }
            PollStatus::Error | PollStatus::Invalid => self.fail_open(),
            PollStatus::Pending => {}
        }
    }

    fn fail_open(&mut self) {
        if self.state == State::OpenMediaList {
            // one unavailable media playlist is not fatal
            warn!("media playlist {} unavailable", self.parse_idx);
            if let Some(entry) = self.master.entry_mut(self.parse_idx) {
                entry.info.available = false;
            }
            self.advance_media_list();
        } else {
            self.state = State::NoStreamError;
        }
    }

    fn update_read_root_list(&mut self) {
        match self.input.poll(self.request) {
            PollStatus::Complete(_count) => {
                let Some(buffer) = self.input.take_buffer(self.request) else {
                    self.state = State::InternalError;
                    return;
                };
                let text = String::from_utf8_lossy(&buffer.readable()).into_owned();
                let mut parser = HLSMasterPlaylistParser::new();
                for line in text.lines() {
                    if parser.parse_line(&mut self.master, line).is_err() {
                        self.state = State::NoStreamError;
                        return;
                    }
                }

                debug!("master playlist: {} variant(s)", self.master.len());
                if self.master.is_empty() {
                    self.state = State::NoStreamError;
                } else {
                    self.open_media_list_at(0);
                }
            }
            PollStatus::Error | PollStatus::Invalid => self.state = State::NoStreamError,
            PollStatus::Pending => {}
        }
    }

    fn update_read_media_list(&mut self) {
        match self.input.poll(self.request) {
            PollStatus::Complete(_count) => {
                let Some(buffer) = self.input.take_buffer(self.request) else {
                    self.state = State::InternalError;
                    return;
                };
                let text = String::from_utf8_lossy(&buffer.readable()).into_owned();
                let available = self.parse_media_list(&text);
                if let Some(entry) = self.master.entry_mut(self.parse_idx) {
                    entry.info.available = available;
                }
                self.advance_media_list();
            }
            PollStatus::Error | PollStatus::Invalid => {
                warn!("media playlist {} fetch failed", self.parse_idx);
                if let Some(entry) = self.master.entry_mut(self.parse_idx) {
                    entry.info.available = false;
                }
                self.advance_media_list();
            }
            PollStatus::Pending => {}
        }
    }

    fn parse_media_list(&mut self, text: &str) -> bool {
        let Some(entry) = self.master.entry_mut(self.parse_idx) else {
            return false;
        };
        let mut parser = HLSPlaylistParser::new();
        for line in text.lines() {
            if let Err(err) = parser.parse_line(&mut entry.playlist, line) {
                warn!("media playlist {}: {err}", self.parse_idx);
                return false;
            }
        }
        parser.finish(&mut entry.playlist);
        true
    }

    /// Opens the media playlist at `index`, or selects a stream to play
    /// once every entry has been visited.
    fn open_media_list_at(&mut self, index: usize) {
        self.parse_idx = index;
        let Some(entry) = self.master.entries().get(index) else {
            self.select_playback();
            return;
        };
        let url = self.resolve_url(entry.playlist.uri());
        self.request = self.input.open(&url);
        self.state = State::OpenMediaList;
    }

    fn advance_media_list(&mut self) {
        self.open_media_list_at(self.parse_idx + 1);
    }

    /// Picks the first variant whose media playlist arrived.
    fn select_playback(&mut self) {
        match self
            .master
            .entries()
            .iter()
            .position(|entry| entry.info.available)
        {
            Some(index) => {
                debug!(
                    "playing variant {index} ({} segments)",
                    self.master.entries()[index].playlist.segment_count()
                );
                self.play_idx = Some(index);
                self.bank.reset();
                self.segment_index = 0;
                self.state = State::DownloadSegment;
            }
            None => self.state = State::NoStreamError,
        }
    }

    fn update_download_segment(&mut self) {
        let Some(play_idx) = self.play_idx else {
            self.state = State::InternalError;
            return;
        };
        let playlist = &self.master.entries()[play_idx].playlist;
        if self.segment_index >= playlist.segment_count() {
            return; // playback drained; nothing left to download
        }
        if self.bank.video_pos.has_write_space() && self.bank.audio_pos.has_write_space() {
            let Some(segment) = playlist.segment(self.segment_index) else {
                self.state = State::InternalError;
                return;
            };
            let url = self.resolve_url(&segment.uri);
            debug!("downloading segment {}: {url}", self.segment_index);
            self.request = self.input.open(&url);
            self.state = State::OpenSegment;
        }
    }

    fn update_read_segment(&mut self) {
        match self.input.poll(self.request) {
            PollStatus::Complete(_count) => {
                let Some(mut segment) = self.input.take_buffer(self.request) else {
                    self.state = State::InternalError;
                    return;
                };
                match self.demuxer.read(&mut segment, &mut self.bank) {
                    Ok(stats) => {
                        debug!(
                            "segment {}: {} packets, {} skipped",
                            self.segment_index, stats.sync_count, stats.skip_count
                        );
                        self.segment_index += 1;
                        self.state = State::DownloadSegment;
                    }
                    Err(DemuxioError::OutOfMemory) => self.state = State::MemoryError,
                    Err(err) => {
                        warn!("segment {} demux failed: {err}", self.segment_index);
                        self.state = State::InStreamError;
                    }
                }
            }
            PollStatus::Error | PollStatus::Invalid => {
                // transient fetch failure; retry the segment
                self.state = State::DownloadSegment;
            }
            PollStatus::Pending => {}
        }
    }

    fn resolve_url(&self, uri: &str) -> String {
        if uri.starts_with("http:") || uri.starts_with("https:") {
            uri.to_string()
        } else {
            format!("{}{}", self.root_url, uri)
        }
    }
}

impl<I: StreamInput> MediaStream for HLSSession<I> {
    fn update(&mut self) {
        HLSSession::update(self);
    }
}

impl<I: StreamInput> Drop for HLSSession<I> {
    fn drop(&mut self) {
        if self.resource != 0 {
            self.input.close(self.resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_position_starts_empty_with_write_space() {
        let pos = StreamPosition::new(2);
        assert!(!pos.has_read_space());
        assert!(pos.has_write_space());
    }

    #[test]
    fn test_position_write_then_read_cycle() {
        let mut pos = StreamPosition::new(2);
        assert!(pos.advance_write());
        assert!(pos.has_read_space());
        assert!(pos.has_write_space());
        assert!(pos.advance_read());
        assert!(!pos.has_read_space());
    }

    #[test]
    fn test_position_full_ring_blocks_writer() {
        let mut pos = StreamPosition::new(2);
        assert!(pos.advance_write()); // slot 0 done, writer on 1
        assert!(!pos.advance_write()); // slot 1 done, reader still on 0
        assert!(!pos.has_write_space());
    }

    #[test]
    fn test_position_advance_read_reclaims_parked_writer() {
        let mut pos = StreamPosition::new(2);
        pos.advance_write();
        pos.advance_write(); // ring now full, writer parked on slot 1
        assert!(pos.advance_read());
        // the freed slot 0 is handed straight back to the writer
        assert_eq!(pos.write_to_idx, 0);
        assert_eq!(pos.read_from_idx, 1);
        assert!(pos.has_read_space());
        assert!(pos.has_write_space());
    }

    #[test]
    fn test_position_read_on_empty_ring_fails() {
        let mut pos = StreamPosition::new(2);
        assert!(!pos.advance_read());
    }

    fn bank(video: usize, audio: usize) -> StreamBank {
        StreamBank::new(
            Buffer::with_capacity(video),
            Buffer::with_capacity(audio),
            2,
        )
    }

    #[test]
    fn test_bank_assigns_disjoint_index_ranges() {
        let mut bank = bank(256, 256);
        let video = bank.create_stream(StreamType::VideoH264, 1).unwrap().index();
        let audio = bank.create_stream(StreamType::AudioAac, 1).unwrap().index();
        assert_eq!(video, 0x01);
        assert_eq!(audio, 0x80);
        assert!(bank.get_stream(1, video).is_some());
        assert!(bank.get_stream(1, audio).is_some());
        assert!(bank.get_stream(1, 0x02).is_none());
    }

    #[test]
    fn test_bank_windows_split_host_buffer() {
        let mut bank = bank(512, 128);
        {
            let video = bank.create_stream(StreamType::VideoH264, 1).unwrap();
            let mut payload = Buffer::from_vec(vec![0xab; 200]);
            assert_eq!(video.append_payload(&mut payload, 200, true), 0);
        }
        // second slot gets its own half even with slot 0 partially full
        bank.video_pos.advance_write();
        let second = bank.create_stream(StreamType::VideoH264, 1).unwrap();
        assert_eq!(second.index(), 0x02);
        let mut payload = Buffer::from_vec(vec![0xcd; 300]);
        // half of 512 is 256; a 300-byte append overflows by 44
        assert_eq!(second.append_payload(&mut payload, 300, true), 44);
    }

    #[test]
    fn test_bank_finalize_flushes_and_advances() {
        let mut bank = bank(256, 256);
        {
            let video = bank.create_stream(StreamType::VideoH264, 7).unwrap();
            let mut payload = Buffer::from_vec(vec![
                0x00, 0x00, 0x01, 0x09, 0xf0, 0x00, 0x00, 0x01, 0x65, 0x80, 0x11,
            ]);
            let len = payload.size();
            video.append_payload(&mut payload, len, true);
        }
        bank.finalize_stream(7, 0x01);
        assert!(bank.video_pos.has_read_space());

        let unit = bank.pull(true).expect("flushed access unit");
        assert_eq!(unit.data.len(), 11);
    }

    #[test]
    fn test_bank_pull_drains_then_frees_slot() {
        let mut bank = bank(256, 256);
        bank.create_stream(StreamType::AudioAac, 1).unwrap();
        bank.finalize_stream(1, 0x80);
        // audio streams emit no access units; pulling just frees the slot
        assert!(bank.pull(false).is_none());
        assert!(!bank.audio_pos.has_read_space());
    }
}
