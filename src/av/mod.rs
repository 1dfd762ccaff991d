//! Elementary-stream model and host-facing capabilities.
//!
//! The demuxer's output is a set of [`ElementaryStream`] objects carrying
//! payload bytes and, for H.264, a list of [`AccessUnit`] boundaries. The
//! host feeds the pipeline through the non-blocking [`StreamInput`]
//! capability and drives it by polling a [`MediaStream`].

/// Elementary stream types supported by the demuxer, as carried in the
/// PMT `stream_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// ISO/IEC 13818-7 ADTS AAC audio
    AudioAac = 0x0f,
    /// ITU-T H.264 / ISO/IEC 14496-10 video
    VideoH264 = 0x1b,
}

impl StreamType {
    /// Maps a PMT `stream_type` byte to a supported type, or `None` for
    /// everything the demuxer does not materialize.
    pub fn from_stream_type(value: u8) -> Option<Self> {
        match value {
            0x0f => Some(StreamType::AudioAac),
            0x1b => Some(StreamType::VideoH264),
            _ => None,
        }
    }

    /// True for video stream types.
    pub fn is_video(self) -> bool {
        matches!(self, StreamType::VideoH264)
    }

    /// True for audio stream types.
    pub fn is_audio(self) -> bool {
        matches!(self, StreamType::AudioAac)
    }
}

pub mod input;
pub mod stream;

pub use input::{MediaStream, PollStatus, RequestHandle, ResourceHandle, StreamInput};
pub use stream::{AccessUnit, ElementaryStream};
