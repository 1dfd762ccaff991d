//! Plays an HLS stream from local files, printing every pulled access
//! unit. The playlist "URL" is a filesystem path; segment and media
//! playlist URIs resolve relative to it.
//!
//! Usage: `cargo run --example hls_player [master.m3u8]`
//! (defaults to the configured playlist URL; see demuxio.toml)

use std::collections::HashMap;

use demuxio::av::{PollStatus, RequestHandle, ResourceHandle, StreamInput};
use demuxio::buffer::Buffer;
use demuxio::config;
use demuxio::format::hls::HLSSession;
use demuxio::format::ts::types::pts_to_time;

/// Blocking file-backed input: every request completes on its first poll.
struct FileInput {
    resources: HashMap<ResourceHandle, Vec<u8>>,
    reads: HashMap<RequestHandle, (ResourceHandle, Option<Buffer>)>,
    opens: HashMap<RequestHandle, ResourceHandle>,
    next_request: RequestHandle,
    next_resource: ResourceHandle,
}

impl FileInput {
    fn new() -> Self {
        Self {
            resources: HashMap::new(),
            reads: HashMap::new(),
            opens: HashMap::new(),
            next_request: 1,
            next_resource: 1,
        }
    }

    fn next_request_handle(&mut self) -> RequestHandle {
        let handle = self.next_request;
        self.next_request += 1;
        handle
    }
}

impl StreamInput for FileInput {
    fn open(&mut self, url: &str) -> RequestHandle {
        let handle = self.next_request_handle();
        if let Ok(data) = std::fs::read(url) {
            let resource = self.next_resource;
            self.next_resource += 1;
            self.resources.insert(resource, data);
            self.opens.insert(handle, resource);
        }
        // unknown paths leave the request unmapped; poll reports Invalid
        handle
    }

    fn size(&mut self, resource: ResourceHandle) -> usize {
        self.resources.get(&resource).map_or(0, Vec::len)
    }

    fn read(&mut self, resource: ResourceHandle, dst: Buffer) -> RequestHandle {
        let handle = self.next_request_handle();
        self.reads.insert(handle, (resource, Some(dst)));
        handle
    }

    fn take_buffer(&mut self, request: RequestHandle) -> Option<Buffer> {
        self.reads.remove(&request).and_then(|(_, dst)| dst)
    }

    fn close(&mut self, resource: ResourceHandle) {
        self.resources.remove(&resource);
    }

    fn poll(&mut self, request: RequestHandle) -> PollStatus {
        if let Some(&resource) = self.opens.get(&request) {
            return PollStatus::Complete(resource);
        }
        if let Some((resource, dst)) = self.reads.get_mut(&request) {
            let data = self.resources.get(resource).cloned().unwrap_or_default();
            if let Some(buffer) = dst.as_mut() {
                if buffer.size() == 0 {
                    buffer.push_bytes(&data);
                }
            }
            return PollStatus::Complete(data.len() as u64);
        }
        PollStatus::Invalid
    }
}

fn main() {
    let settings = config::current();
    let playlist = std::env::args().nth(1).unwrap_or(settings.playlist_url);

    let mut session = HLSSession::new(
        FileInput::new(),
        Buffer::with_capacity(settings.video_buffer_size),
        Buffer::with_capacity(settings.audio_buffer_size),
        &playlist,
    )
    .with_buffer_count(settings.stream_buffer_count);

    let mut video_units = 0usize;
    let mut audio_units = 0usize;
    for _ in 0..100_000 {
        session.update();
        if let Some(error) = session.error() {
            eprintln!("playback failed: {error:?}");
            std::process::exit(1);
        }
        while let Some(unit) = session.pull_video() {
            println!(
                "video au {video_units}: {} bytes @ {:?} (dts {:?})",
                unit.data.len(),
                pts_to_time(unit.pts),
                pts_to_time(unit.dts)
            );
            video_units += 1;
        }
        while let Some(unit) = session.pull_audio() {
            println!("audio au {audio_units}: {} bytes", unit.data.len());
            audio_units += 1;
        }
        if session.finished() {
            break;
        }
    }

    if let Some(selected) = session.selected_stream() {
        println!(
            "played {} segment(s) of {} ({}x{}, {} bps): {video_units} video / {audio_units} audio units",
            session.segment_index(),
            selected.playlist.uri(),
            selected.info.frame_width,
            selected.info.frame_height,
            selected.info.bandwidth,
        );
    }
}
