use super::pes::TsSectionPes;
use super::psi::{TsSectionPat, TsSectionPmt};
use crate::av::{MediaSample, StreamInfo};
use crate::error::Result;

/// Output of a section or elementary stream parser, applied by the demuxer
/// once the packet that produced it has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionEvent {
    /// A PAT announced the PMT PID of a program.
    RegisterPmt { program_number: u16, pmt_pid: u16 },
    /// A PMT announced an elementary stream.
    RegisterPes { pid: u16, stream_type: u8 },
    /// An elementary stream parser derived a new decoder configuration.
    NewStreamInfo(StreamInfo),
    /// An elementary stream parser completed an access unit.
    Sample(MediaSample),
}

/// The parser bound to one PID.
#[derive(Debug)]
pub enum TsSection {
    Pat(TsSectionPat),
    Pmt(TsSectionPmt),
    Pes(Box<TsSectionPes>),
}

impl TsSection {
    pub fn parse(
        &mut self,
        payload_unit_start: bool,
        buf: &[u8],
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        match self {
            TsSection::Pat(pat) => pat.parse(payload_unit_start, buf, events),
            TsSection::Pmt(pmt) => pmt.parse(payload_unit_start, buf, events),
            TsSection::Pes(pes) => pes.parse(payload_unit_start, buf, events),
        }
    }

    pub fn flush(&mut self, events: &mut Vec<SectionEvent>) -> Result<()> {
        match self {
            TsSection::Pat(_) | TsSection::Pmt(_) => Ok(()),
            TsSection::Pes(pes) => pes.flush(events),
        }
    }

    pub fn reset(&mut self) {
        match self {
            TsSection::Pat(pat) => pat.reset(),
            TsSection::Pmt(pmt) => pmt.reset(),
            TsSection::Pes(pes) => pes.reset(),
        }
    }
}
