//! Media playlists: segment lists with timing metadata.

use log::warn;

use crate::error::Result;

/// One media segment entry of a playlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// Segment URI, relative to the playlist's root unless absolute
    pub uri: String,
    /// Declared duration in seconds (from `#EXTINF`)
    pub duration: f32,
}

/// An HLS media playlist: an ordered list of transport-stream segments.
#[derive(Debug, Default)]
pub struct HLSPlaylist {
    uri: String,
    seq_no: i32,
    target_duration: f32,
    version: i32,
    segments: Vec<Segment>,
}

impl HLSPlaylist {
    /// Creates an empty playlist fetched from `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            seq_no: 0,
            target_duration: 0.0,
            version: 1,
            segments: Vec::new(),
        }
    }

    /// URI this playlist was (or will be) fetched from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// First media sequence number (`#EXT-X-MEDIA-SEQUENCE`).
    pub fn seq_no(&self) -> i32 {
        self.seq_no
    }

    /// Maximum segment duration in seconds (`#EXT-X-TARGETDURATION`).
    pub fn target_duration(&self) -> f32 {
        self.target_duration
    }

    /// Playlist protocol version (`#EXT-X-VERSION`, default 1).
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Number of segments parsed so far.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The `index`-th segment, in playlist order.
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Appends a segment entry.
    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Init,
    InputLine,
    PlaylistLine,
}

/// Line-oriented media playlist parser.
///
/// Feed one line at a time with [`parse_line`](Self::parse_line) and call
/// [`finish`](Self::finish) after the last line to flush a segment whose
/// URI was carried inline on its `#EXTINF` tag.
#[derive(Debug)]
pub struct HLSPlaylistParser {
    state: ParserState,
    pending: Segment,
    pending_inline_uri: bool,
}

impl Default for HLSPlaylistParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HLSPlaylistParser {
    /// Creates a parser expecting the `#EXTM3U` signature line.
    pub fn new() -> Self {
        Self {
            state: ParserState::Init,
            pending: Segment::default(),
            pending_inline_uri: false,
        }
    }

    /// Consumes one playlist line (leading/trailing whitespace ignored).
    ///
    /// Unrecognized comments and tags are skipped; malformed numeric
    /// values surface as errors.
    pub fn parse_line(&mut self, playlist: &mut HLSPlaylist, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        match self.state {
            ParserState::Init => {
                if trimmed == "#EXTM3U" {
                    self.state = ParserState::InputLine;
                }
            }
            ParserState::InputLine => {
                if !trimmed.starts_with('#') {
                    return Ok(());
                }
                let Some((tag, value)) = trimmed.split_once(':') else {
                    return Ok(()); // plain comment
                };
                match tag {
                    "#EXT-X-VERSION" => {
                        if playlist.version == 1 {
                            playlist.version = value.trim().parse()?;
                        } else {
                            warn!("duplicate #EXT-X-VERSION ignored");
                        }
                    }
                    "#EXT-X-TARGETDURATION" => {
                        playlist.target_duration = value.trim().parse()?;
                    }
                    "#EXT-X-MEDIA-SEQUENCE" => {
                        playlist.seq_no = value.trim().parse()?;
                    }
                    "#EXTINF" => {
                        let Some((duration, rest)) = value.split_once(',') else {
                            warn!("#EXTINF without comma: {trimmed}");
                            return Ok(());
                        };
                        self.pending.duration = duration.trim().parse()?;
                        // text after the comma is normally a title, but a
                        // playlist may carry the URI inline there; keep it
                        // as the fallback URI until the next line decides
                        let rest = rest.trim();
                        if rest.is_empty() {
                            self.pending_inline_uri = false;
                        } else {
                            self.pending.uri = rest.to_string();
                            self.pending_inline_uri = true;
                        }
                        self.state = ParserState::PlaylistLine;
                    }
                    _ => {}
                }
            }
            ParserState::PlaylistLine => {
                if trimmed.starts_with('#') && self.pending_inline_uri {
                    // the #EXTINF carried the URI itself; this line is the
                    // next tag, so flush and reprocess it as an input line
                    self.take_pending(playlist);
                    self.state = ParserState::InputLine;
                    return self.parse_line(playlist, trimmed);
                }
                self.pending.uri = trimmed.to_string();
                self.take_pending(playlist);
                self.state = ParserState::InputLine;
            }
        }

        Ok(())
    }

    /// Flushes a trailing segment whose `#EXTINF` carried an inline URI.
    pub fn finish(&mut self, playlist: &mut HLSPlaylist) {
        if self.state == ParserState::PlaylistLine && self.pending_inline_uri {
            self.take_pending(playlist);
        }
        self.state = ParserState::InputLine;
    }

    fn take_pending(&mut self, playlist: &mut HLSPlaylist) {
        playlist.add_segment(std::mem::take(&mut self.pending));
        self.pending_inline_uri = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> HLSPlaylist {
        let mut playlist = HLSPlaylist::new("prog_index.m3u8");
        let mut parser = HLSPlaylistParser::new();
        for line in text.lines() {
            parser.parse_line(&mut playlist, line).unwrap();
        }
        parser.finish(&mut playlist);
        playlist
    }

    #[test]
    fn test_media_playlist_with_titles_and_bare_extinf() {
        let playlist = parse(
            "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:42\n\
             #EXTINF:9.009,\nseg0.ts\n#EXTINF:9.009,title\nseg1.ts\n",
        );
        assert_eq!(playlist.seq_no(), 42);
        assert_eq!(playlist.target_duration(), 10.0);
        assert_eq!(playlist.segment_count(), 2);
        assert_eq!(playlist.segment(0).unwrap().uri, "seg0.ts");
        assert_eq!(playlist.segment(0).unwrap().duration, 9.009);
        assert_eq!(playlist.segment(1).unwrap().uri, "seg1.ts");
        assert_eq!(playlist.segment(1).unwrap().duration, 9.009);
    }

    #[test]
    fn test_inline_uri_flushed_by_following_tag() {
        let playlist = parse(
            "#EXTM3U\n#EXTINF:4.0,seg0.ts\n#EXTINF:4.0,\nseg1.ts\n",
        );
        assert_eq!(playlist.segment_count(), 2);
        assert_eq!(playlist.segment(0).unwrap().uri, "seg0.ts");
        assert_eq!(playlist.segment(1).unwrap().uri, "seg1.ts");
    }

    #[test]
    fn test_inline_uri_flushed_at_end_of_input() {
        let playlist = parse("#EXTM3U\n#EXTINF:4.0,last.ts\n");
        assert_eq!(playlist.segment_count(), 1);
        assert_eq!(playlist.segment(0).unwrap().uri, "last.ts");
    }

    #[test]
    fn test_lines_before_signature_ignored() {
        let playlist = parse("# comment\n#EXTINF:1.0,\nignored.ts\n#EXTM3U\n#EXTINF:2.0,\nseg.ts\n");
        assert_eq!(playlist.segment_count(), 1);
        assert_eq!(playlist.segment(0).unwrap().uri, "seg.ts");
    }

    #[test]
    fn test_version_recorded_once() {
        let playlist = parse("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-VERSION:7\n");
        assert_eq!(playlist.version(), 3);
    }

    #[test]
    fn test_unknown_tags_and_comments_ignored() {
        let playlist = parse(
            "#EXTM3U\n#EXT-X-ALLOW-CACHE:NO\n# a comment\n#EXTINF:5.0,\nseg.ts\n#EXT-X-ENDLIST\n",
        );
        assert_eq!(playlist.segment_count(), 1);
    }

    #[test]
    fn test_malformed_duration_is_an_error() {
        let mut playlist = HLSPlaylist::new("x.m3u8");
        let mut parser = HLSPlaylistParser::new();
        parser.parse_line(&mut playlist, "#EXTM3U").unwrap();
        assert!(parser
            .parse_line(&mut playlist, "#EXTINF:not-a-number,")
            .is_err());
    }
}
