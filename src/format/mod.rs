use crate::av::{MediaSample, StreamInfo};
use crate::Result;

pub mod ts;

/// Receives every stream configuration once, when all of them are known.
pub type InitCb = Box<dyn FnMut(&[StreamInfo])>;

/// Receives each access unit with the track it belongs to.
///
/// Returning an error aborts parsing.
pub type NewSampleCb = Box<dyn FnMut(u32, MediaSample) -> Result<()>>;

/// Common trait for push-based container parsers
pub trait MediaParser {
    /// Registers the callbacks; must be called before the first `parse`.
    fn init(&mut self, init_cb: InitCb, new_sample_cb: NewSampleCb);

    /// Feeds the next chunk of the stream.
    fn parse(&mut self, buf: &[u8]) -> Result<()>;

    /// Emits everything still buffered and resets the parser for a new stream.
    fn flush(&mut self) -> Result<()>;
}

pub use self::ts::Mp2tMediaParser;
