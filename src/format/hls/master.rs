//! Master playlists: variant stream directories.

use crate::error::Result;

use super::playlist::HLSPlaylist;

/// Attributes of one `#EXT-X-STREAM-INF` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistInfo {
    /// Peak bandwidth in bits per second (`BANDWIDTH`)
    pub bandwidth: u32,
    /// Horizontal resolution (`RESOLUTION`), 0 when not declared
    pub frame_width: u32,
    /// Vertical resolution (`RESOLUTION`), 0 when not declared
    pub frame_height: u32,
    /// Raw RFC 6381 codec list (`CODECS`), empty when not declared
    pub codecs: String,
    /// Whether this entry's media playlist was fetched successfully
    pub available: bool,
}

/// One variant stream: its declared attributes plus the media playlist
/// fetched from its URI.
#[derive(Debug, Default)]
pub struct StreamInfo {
    /// Declared stream attributes
    pub info: PlaylistInfo,
    /// The variant's media playlist (populated once fetched)
    pub playlist: HLSPlaylist,
}

/// An HLS master playlist: an ordered list of variant streams.
#[derive(Debug, Default)]
pub struct HLSMasterPlaylist {
    version: i32,
    entries: Vec<StreamInfo>,
}

impl HLSMasterPlaylist {
    /// Creates an empty master playlist.
    pub fn new() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
        }
    }

    /// Playlist protocol version (`#EXT-X-VERSION`, default 1).
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Number of variant entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no variant was parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All variant entries, in playlist order.
    pub fn entries(&self) -> &[StreamInfo] {
        &self.entries
    }

    /// Mutable access to one variant entry.
    pub fn entry_mut(&mut self, index: usize) -> Option<&mut StreamInfo> {
        self.entries.get_mut(index)
    }

    /// Registers a variant stream whose playlist will be fetched from
    /// `uri`.
    pub fn add_stream(&mut self, info: PlaylistInfo, uri: &str) -> &mut StreamInfo {
        self.entries.push(StreamInfo {
            info,
            playlist: HLSPlaylist::new(uri),
        });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Init,
    InputLine,
    PlaylistLine,
}

/// Line-oriented master playlist parser.
#[derive(Debug)]
pub struct HLSMasterPlaylistParser {
    state: ParserState,
    info: PlaylistInfo,
}

impl Default for HLSMasterPlaylistParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HLSMasterPlaylistParser {
    /// Creates a parser expecting the `#EXTM3U` signature line.
    pub fn new() -> Self {
        Self {
            state: ParserState::Init,
            info: PlaylistInfo::default(),
        }
    }

    /// Consumes one playlist line (leading/trailing whitespace ignored).
    ///
    /// `#EXT-X-STREAM-INF` attributes are parsed with quoted-value
    /// support; the following line supplies the variant's URI. Unknown
    /// attribute keys and tags are ignored.
    pub fn parse_line(&mut self, playlist: &mut HLSMasterPlaylist, line: &str) -> Result<()> {
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
                    return Ok(());
                };
                match tag {
                    "#EXT-X-VERSION" => {
                        if playlist.version == 1 {
                            playlist.version = value.trim().parse()?;
                        }
                    }
                    "#EXT-X-STREAM-INF" => {
                        self.info = PlaylistInfo::default();
                        self.parse_stream_inf(value)?;
                        // next line carries the variant's playlist URI
                        self.state = ParserState::PlaylistLine;
                    }
                    _ => {}
                }
            }
            ParserState::PlaylistLine => {
                playlist.add_stream(self.info.clone(), trimmed);
                self.state = ParserState::InputLine;
            }
        }

        Ok(())
    }

    /// Walks the comma-separated `KEY=value` attribute list, honoring
    /// quoted values that contain commas.
    fn parse_stream_inf(&mut self, attrs: &str) -> Result<()> {
        let mut rest = attrs;
        while !rest.is_empty() {
            let Some(eq) = rest.find('=') else { break };
            let key = rest[..eq].trim();
            let after = &rest[eq + 1..];

            let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
                match quoted.find('"') {
                    Some(end) => {
                        let mut rem = &quoted[end + 1..];
                        rem = rem.strip_prefix(',').unwrap_or(rem);
                        (&quoted[..end], rem)
                    }
                    None => (quoted, ""),
                }
            } else {
                match after.find(',') {
                    Some(comma) => (&after[..comma], &after[comma + 1..]),
                    None => (after, ""),
                }
            };

            match key {
                "BANDWIDTH" => self.info.bandwidth = value.trim().parse()?,
                "RESOLUTION" => {
                    if let Some((width, height)) = value.split_once('x') {
                        self.info.frame_width = width.trim().parse()?;
                        self.info.frame_height = height.trim().parse()?;
                    }
                }
                "CODECS" => self.info.codecs = value.to_string(),
                _ => {}
            }
            rest = remainder;
        }
        Ok(())
    }
}
