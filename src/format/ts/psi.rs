//! Program Specific Information: section reassembly, PAT and PMT.

use super::section::SectionEvent;
use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::{BitReader, ByteQueue, Crc32Mpeg2};

const MAX_SECTION_LENGTH: usize = 1021;

/// Reassembles one PSI section from transport packet payloads.
#[derive(Debug)]
pub struct PsiAssembler {
    queue: ByteQueue,
    waiting_for_unit_start: bool,
    leading_bytes_to_discard: usize,
    crc: Crc32Mpeg2,
}

impl Default for PsiAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PsiAssembler {
    pub fn new() -> Self {
        Self {
            queue: ByteQueue::new(),
            waiting_for_unit_start: true,
            leading_bytes_to_discard: 0,
            crc: Crc32Mpeg2::new(),
        }
    }

    /// Feeds one payload and returns the section once it is complete and
    /// its CRC checks out.
    pub fn push(&mut self, payload_unit_start: bool, mut buf: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.waiting_for_unit_start && !payload_unit_start {
            return Ok(None);
        }

        if payload_unit_start {
            self.reset();
            self.waiting_for_unit_start = false;
            let (&pointer_field, rest) = buf
                .split_first()
                .ok_or_else(|| DemuxError::Parser("PSI payload without pointer_field".into()))?;
            self.leading_bytes_to_discard = pointer_field as usize;
            buf = rest;
        }

        if self.leading_bytes_to_discard > 0 {
            let discard = self.leading_bytes_to_discard.min(buf.len());
            buf = &buf[discard..];
            self.leading_bytes_to_discard -= discard;
        }
        if buf.is_empty() {
            return Ok(None);
        }

        self.queue.push(buf);
        let raw = self.queue.peek();

        if raw[0] == TABLE_ID_STUFFING {
            log::trace!("PSI stuffing");
            self.reset();
            return Ok(None);
        }
        if raw.len() < 3 {
            return Ok(None);
        }

        let section_length = (((raw[1] as usize) << 8) | raw[2] as usize) & 0xFFF;
        if section_length > MAX_SECTION_LENGTH {
            return Err(DemuxError::Parser(format!(
                "PSI section_length {} too large",
                section_length
            )));
        }
        let psi_length = section_length + 3;
        if raw.len() < psi_length {
            return Ok(None);
        }
        if raw.len() > psi_length {
            log::trace!("{} trailing bytes after PSI section", raw.len() - psi_length);
        }

        if !self.crc.verify(&raw[..psi_length]) {
            return Err(DemuxError::Parser("PSI CRC mismatch".into()));
        }

        let section = raw[..psi_length].to_vec();
        self.reset();
        Ok(Some(section))
    }

    pub fn reset(&mut self) {
        self.queue.reset();
        self.waiting_for_unit_start = true;
        self.leading_bytes_to_discard = 0;
    }
}

// Fields shared by the PAT and PMT long-form section headers.
struct SectionHeader {
    table_id_extension: u16,
    version_number: u8,
    current_next: bool,
    section_number: u8,
    last_section_number: u8,
    section_length: usize,
}

impl SectionHeader {
    fn is_single_section(&self) -> bool {
        self.section_number == 0 && self.last_section_number == 0
    }
}

fn check_reserved(reader: &mut BitReader, bits: u32, table_id: u8) -> Result<()> {
    let reserved = reader.read_bits(bits)?;
    if reserved != (1 << bits) - 1 {
        log::debug!(
            "Table {:#04x}: reserved bits {:#b} are not all set",
            table_id,
            reserved
        );
    }
    Ok(())
}

fn read_section_header(reader: &mut BitReader, expected_table_id: u8) -> Result<SectionHeader> {
    let table_id = reader.read_bits(8)? as u8;
    if table_id != expected_table_id {
        return Err(DemuxError::Parser(format!(
            "Unexpected table_id {:#04x}, wanted {:#04x}",
            table_id, expected_table_id
        )));
    }
    if !reader.read_bit()? {
        return Err(DemuxError::Parser("section_syntax_indicator not set".into()));
    }
    if reader.read_bit()? {
        return Err(DemuxError::Parser("PSI zero bit set".into()));
    }
    check_reserved(reader, 2, table_id)?;
    let section_length = reader.read_bits(12)? as usize;
    let table_id_extension = reader.read_bits(16)? as u16;
    check_reserved(reader, 2, table_id)?;
    let version_number = reader.read_bits(5)? as u8;
    let current_next = reader.read_bit()?;
    let section_number = reader.read_bits(8)? as u8;
    let last_section_number = reader.read_bits(8)? as u8;

    Ok(SectionHeader {
        table_id_extension,
        version_number,
        current_next,
        section_number,
        last_section_number,
        section_length,
    })
}

/// Program Association Table parser.
#[derive(Debug, Default)]
pub struct TsSectionPat {
    psi: PsiAssembler,
    version_number: Option<u8>,
}

impl TsSectionPat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(
        &mut self,
        payload_unit_start: bool,
        buf: &[u8],
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        match self.psi.push(payload_unit_start, buf)? {
            Some(section) => self.parse_section(&section, events),
            None => Ok(()),
        }
    }

    fn parse_section(&mut self, section: &[u8], events: &mut Vec<SectionEvent>) -> Result<()> {
        let mut reader = BitReader::new(section);
        let header = read_section_header(&mut reader, TABLE_ID_PAT)?;
        if !header.is_single_section() {
            log::debug!(
                "Ignoring PAT section {} of {}: multi-section tables are not supported",
                header.section_number,
                header.last_section_number
            );
            return Ok(());
        }

        // transport_stream_id .. last_section_number (5) and CRC (4)
        if header.section_length < 9 || (header.section_length - 9) % 4 != 0 {
            return Err(DemuxError::Parser(format!(
                "Invalid PAT section_length {}",
                header.section_length
            )));
        }
        let entry_count = (header.section_length - 9) / 4;

        let mut programs = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            let program_number = reader.read_bits(16)? as u16;
            reader.skip_bits(3)?;
            let pid = reader.read_bits(13)? as u16;
            programs.push((program_number, pid));
        }

        if !header.current_next {
            log::trace!("Ignoring PAT not yet applicable");
            return Ok(());
        }
        if self.version_number == Some(header.version_number) {
            return Ok(());
        }

        log::debug!(
            "PAT version {} for transport stream {}",
            header.version_number,
            header.table_id_extension
        );
        for (program_number, pmt_pid) in programs {
            if program_number == 0 {
                log::trace!("Network PID {:#x}", pmt_pid);
                continue;
            }
            events.push(SectionEvent::RegisterPmt {
                program_number,
                pmt_pid,
            });
        }
        self.version_number = Some(header.version_number);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.psi.reset();
        self.version_number = None;
    }
}

/// Program Map Table parser.
#[derive(Debug, Default)]
pub struct TsSectionPmt {
    psi: PsiAssembler,
    version_number: Option<u8>,
}

impl TsSectionPmt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(
        &mut self,
        payload_unit_start: bool,
        buf: &[u8],
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        match self.psi.push(payload_unit_start, buf)? {
            Some(section) => self.parse_section(&section, events),
            None => Ok(()),
        }
    }

    fn parse_section(&mut self, section: &[u8], events: &mut Vec<SectionEvent>) -> Result<()> {
        let mut reader = BitReader::new(section);
        let header = read_section_header(&mut reader, TABLE_ID_PMT)?;
        if !header.is_single_section() {
            log::debug!(
                "Ignoring PMT section {} of {}: multi-section tables are not supported",
                header.section_number,
                header.last_section_number
            );
            return Ok(());
        }
        if header.section_length < 13 {
            return Err(DemuxError::Parser(format!(
                "Invalid PMT section_length {}",
                header.section_length
            )));
        }

        reader.skip_bits(3)?;
        let pcr_pid = reader.read_bits(13)? as u16;
        reader.skip_bits(4)?;
        let program_info_length = reader.read_bits(12)? as usize;
        // 9 header bytes after section_length, 4 CRC bytes
        let mut es_info_size = (header.section_length - 13)
            .checked_sub(program_info_length)
            .ok_or_else(|| DemuxError::Parser("PMT program_info_length overruns section".into()))?;
        reader.skip_bits(8 * program_info_length)?;

        let mut streams = Vec::new();
        while es_info_size > 0 {
            if es_info_size < 5 {
                return Err(DemuxError::Parser("Truncated PMT stream entry".into()));
            }
            let stream_type = reader.read_bits(8)? as u8;
            reader.skip_bits(3)?;
            let pid = reader.read_bits(13)? as u16;
            reader.skip_bits(4)?;
            let es_info_length = reader.read_bits(12)? as usize;
            es_info_size = (es_info_size - 5)
                .checked_sub(es_info_length)
                .ok_or_else(|| DemuxError::Parser("PMT es_info_length overruns section".into()))?;
            reader.skip_bits(8 * es_info_length)?;
            streams.push((pid, stream_type));
        }

        if !header.current_next {
            log::trace!("Ignoring PMT not yet applicable");
            return Ok(());
        }
        if self.version_number == Some(header.version_number) {
            return Ok(());
        }

        log::debug!(
            "PMT version {} for program {}, PCR PID {:#x}, {} streams",
            header.version_number,
            header.table_id_extension,
            pcr_pid,
            streams.len()
        );
        for (pid, stream_type) in streams {
            events.push(SectionEvent::RegisterPes { pid, stream_type });
        }
        self.version_number = Some(header.version_number);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.psi.reset();
        self.version_number = None;
    }
}
