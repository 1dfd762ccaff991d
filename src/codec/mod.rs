//! Codec-level parsers.
//!
//! Only the pieces of codec syntax the demuxer needs live here: for
//! H.264, recognizing NAL unit boundaries well enough to cut the payload
//! into access units. Decoding the bitstreams themselves is a consumer
//! concern.

pub mod h264;
