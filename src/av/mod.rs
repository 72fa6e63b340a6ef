//! Media types shared by the elementary stream parsers and the demuxer.

mod sample;
mod stream_info;
mod timestamp;

pub use sample::*;
pub use stream_info::*;
pub use timestamp::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    H264,
    AAC,
}
