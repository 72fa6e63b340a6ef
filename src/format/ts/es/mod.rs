//! Elementary stream parsers: split PES payloads into timestamped access units.

mod adts;
mod h264;

pub use adts::EsParserAdts;
pub use h264::EsParserH264;

use super::section::SectionEvent;
use super::types::{STREAM_TYPE_AAC, STREAM_TYPE_H264};
use crate::config::ParserConfig;
use crate::error::Result;

#[derive(Debug)]
pub enum EsParser {
    Adts(EsParserAdts),
    H264(EsParserH264),
}

impl EsParser {
    /// Builds the parser for a PMT stream type, or `None` when the type is not handled.
    pub fn for_stream_type(stream_type: u8, pid: u16, config: &ParserConfig) -> Option<Self> {
        match stream_type {
            STREAM_TYPE_AAC => Some(EsParser::Adts(EsParserAdts::new(pid, config.sbr_in_mimetype))),
            STREAM_TYPE_H264 => Some(EsParser::H264(EsParserH264::new(pid))),
            _ => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, EsParser::Adts(_))
    }

    /// Feeds one PES payload. Timestamps are in microseconds.
    pub fn parse(
        &mut self,
        buf: &[u8],
        pts: Option<i64>,
        dts: Option<i64>,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        match self {
            EsParser::Adts(parser) => parser.parse(buf, pts, events),
            EsParser::H264(parser) => parser.parse(buf, pts, dts, events),
        }
    }

    pub fn flush(&mut self, events: &mut Vec<SectionEvent>) -> Result<()> {
        match self {
            EsParser::Adts(parser) => parser.flush(events),
            EsParser::H264(parser) => parser.flush(events),
        }
    }

    pub fn reset(&mut self) {
        match self {
            EsParser::Adts(parser) => parser.reset(),
            EsParser::H264(parser) => parser.reset(),
        }
    }
}
