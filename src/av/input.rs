//! Non-blocking stream input capability.
//!
//! The HLS session does no I/O of its own. The host supplies an object
//! implementing [`StreamInput`], whose operations all complete through
//! [`StreamInput::poll`]: `open` and `read` return a request handle, and
//! the session polls that handle on every update until it reports
//! [`PollStatus::Complete`]. Nothing in this contract may block.

use crate::buffer::Buffer;

/// Handle identifying an outstanding open or read request. 0 is invalid.
pub type RequestHandle = u32;

/// Handle identifying an opened resource. 0 is invalid.
pub type ResourceHandle = u64;

/// Completion state of an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The request handle does not name a known request.
    Invalid,
    /// The request has not finished yet; poll again later.
    Pending,
    /// The request finished. For an open request the payload is the
    /// resource handle; for a read request it is the byte count.
    Complete(u64),
    /// The request failed.
    Error,
}

/// Host-implemented input capability for playlists and segments.
///
/// All operations are non-blocking; long-running work is observed through
/// `poll`. A read request takes ownership of its destination [`Buffer`]
/// (the host pushes the received bytes into it) and hands it back through
/// [`StreamInput::take_buffer`] once the request completes.
pub trait StreamInput {
    /// Starts opening the resource at `url`. Returns 0 when the request
    /// could not even be issued.
    fn open(&mut self, url: &str) -> RequestHandle;

    /// Total byte count of an opened resource.
    fn size(&mut self, resource: ResourceHandle) -> usize;

    /// Starts reading the whole resource into `dst`. Returns 0 when the
    /// request could not be issued; `dst` is dropped in that case.
    fn read(&mut self, resource: ResourceHandle, dst: Buffer) -> RequestHandle;

    /// Reclaims the destination buffer of a completed read request.
    fn take_buffer(&mut self, request: RequestHandle) -> Option<Buffer>;

    /// Releases an opened resource.
    fn close(&mut self, resource: ResourceHandle);

    /// Reports the state of an outstanding request.
    fn poll(&mut self, request: RequestHandle) -> PollStatus;
}

/// A cooperatively scheduled media stream.
///
/// Implementations advance their internal state machine on each call and
/// return without blocking; the host decides the polling cadence.
pub trait MediaStream {
    /// Advances the stream: polls outstanding I/O, consumes completed
    /// responses, or feeds bytes into the demuxer.
    fn update(&mut self);
}
