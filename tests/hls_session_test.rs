//! End-to-end session test over an in-memory input host.

mod common;

use common::*;
use demuxio::av::MediaStream;
use demuxio::buffer::Buffer;
use demuxio::format::hls::{HLSSession, SessionError};
use demuxio::format::ts::{STREAM_TYPE_AAC, STREAM_TYPE_H264};
use pretty_assertions::assert_eq;

/// One segment: PAT, PMT (H.264 + AAC), one video PES with a whole access
/// unit, one audio PES.
fn segment(pts: u64) -> Vec<u8> {
    let mut video = pes_head(0xe0, Some(pts), None);
    video.extend_from_slice(&[0x00, 0x00, 0x01, 0x09, 0xf0]);
    video.extend_from_slice(&[0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1e]);
    video.extend_from_slice(&[0x00, 0x00, 0x01, 0x65, 0x80, 0x88, 0x44, 0x22]);

    let mut audio = pes_head(0xc0, Some(pts), None);
    audio.extend_from_slice(&[0xff, 0xf1, 0x50, 0x80, 0x01, 0x00]);

    [
        pat_packet(0x0001, 0x1000),
        pmt_packet(
            0x1000,
            0x0001,
            &[(STREAM_TYPE_H264, 0x0100), (STREAM_TYPE_AAC, 0x0101)],
        ),
        ts_packet_padded(0x0100, true, &video),
        ts_packet_padded(0x0101, true, &audio),
    ]
    .concat()
}

fn host() -> MemoryStreamInput {
    let mut input = MemoryStreamInput::new(1);
    input.insert(
        "http://test.local/master.m3u8",
        b"#EXTM3U\n\
          #EXT-X-VERSION:3\n\
          #EXT-X-STREAM-INF:BANDWIDTH=200000,RESOLUTION=416x234\n\
          missing.m3u8\n\
          #EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=640x360,CODECS=\"avc1.42e01e\"\n\
          prog.m3u8\n"
            .to_vec(),
    );
    input.insert(
        "http://test.local/prog.m3u8",
        b"#EXTM3U\n\
          #EXT-X-TARGETDURATION:10\n\
          #EXT-X-MEDIA-SEQUENCE:0\n\
          #EXTINF:9.009,\n\
          seg0.ts\n\
          #EXTINF:9.009,\n\
          seg1.ts\n\
          #EXT-X-ENDLIST\n"
            .to_vec(),
    );
    input.insert("http://test.local/seg0.ts", segment(90_000));
    input.insert("http://test.local/seg1.ts", segment(180_000));
    input
}

#[test]
fn test_session_plays_both_segments() {
    let mut session = HLSSession::new(
        host(),
        Buffer::with_capacity(16 << 10),
        Buffer::with_capacity(4 << 10),
        "http://test.local/master.m3u8",
    );

    let mut video_pts = Vec::new();
    let mut audio_units = 0usize;
    for _ in 0..500 {
        session.update();
        assert_eq!(session.error(), None, "session failed");
        while let Some(unit) = session.pull_video() {
            assert!(unit.data.starts_with(&[0x00, 0x00, 0x01, 0x09]));
            video_pts.push(unit.pts);
        }
        while session.pull_audio().is_some() {
            audio_units += 1;
        }
        if session.finished() {
            break;
        }
    }

    assert!(session.finished(), "session did not finish");
    // one flushed access unit per segment, in arrival order
    assert_eq!(video_pts, vec![90_000, 180_000]);
    // AAC payload is not cut into units
    assert_eq!(audio_units, 0);

    // the unavailable first variant was skipped
    let master = session.master_playlist();
    assert_eq!(master.len(), 2);
    assert!(!master.entries()[0].info.available);
    assert!(master.entries()[1].info.available);
    let selected = session.selected_stream().unwrap();
    assert_eq!(selected.playlist.uri(), "prog.m3u8");
    assert_eq!(selected.info.bandwidth, 1_280_000);
    assert_eq!(session.segment_index(), 2);
}

#[test]
fn test_session_fails_without_any_media_playlist() {
    let mut input = MemoryStreamInput::new(0);
    input.insert(
        "http://test.local/master.m3u8",
        b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nmissing.m3u8\n".to_vec(),
    );

    let mut session = HLSSession::new(
        input,
        Buffer::with_capacity(1024),
        Buffer::with_capacity(1024),
        "http://test.local/master.m3u8",
    );

    for _ in 0..50 {
        MediaStream::update(&mut session);
        if session.error().is_some() {
            break;
        }
    }
    assert_eq!(session.error(), Some(SessionError::NoStream));
}

#[test]
fn test_session_fails_on_missing_root_playlist() {
    let mut session = HLSSession::new(
        MemoryStreamInput::new(2),
        Buffer::with_capacity(1024),
        Buffer::with_capacity(1024),
        "http://test.local/master.m3u8",
    );

    for _ in 0..50 {
        session.update();
        if session.error().is_some() {
            break;
        }
    }
    assert_eq!(session.error(), Some(SessionError::NoStream));
}

#[test]
fn test_session_reports_demux_failure() {
    let mut input = MemoryStreamInput::new(0);
    input.insert(
        "http://test.local/master.m3u8",
        b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nprog.m3u8\n".to_vec(),
    );
    input.insert(
        "http://test.local/prog.m3u8",
        b"#EXTM3U\n#EXTINF:1.0,\nbad.ts\n".to_vec(),
    );
    input.insert("http://test.local/bad.ts", vec![0x48; 188]); // wrong sync

    let mut session = HLSSession::new(
        input,
        Buffer::with_capacity(1024),
        Buffer::with_capacity(1024),
        "http://test.local/master.m3u8",
    );

    for _ in 0..50 {
        session.update();
        if session.error().is_some() {
            break;
        }
    }
    assert_eq!(session.error(), Some(SessionError::InStream));
}

#[test]
fn test_absolute_segment_uris_bypass_root() {
    let mut input = MemoryStreamInput::new(0);
    input.insert(
        "http://test.local/deep/path/master.m3u8",
        b"#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nhttp://cdn.local/prog.m3u8\n".to_vec(),
    );
    input.insert(
        "http://cdn.local/prog.m3u8",
        b"#EXTM3U\n#EXTINF:1.0,\nseg0.ts\n".to_vec(),
    );
    // relative segment resolves against the *root* playlist's directory
    input.insert("http://test.local/deep/path/seg0.ts", segment(90_000));

    let mut session = HLSSession::new(
        input,
        Buffer::with_capacity(8 << 10),
        Buffer::with_capacity(2 << 10),
        "http://test.local/deep/path/master.m3u8",
    );

    for _ in 0..200 {
        session.update();
        while session.pull_video().is_some() {}
        while session.pull_audio().is_some() {}
        if session.finished() || session.error().is_some() {
            break;
        }
    }
    assert_eq!(session.error(), None);
    assert!(session.finished());
}
