use super::es::EsParser;
use super::section::SectionEvent;
use super::types::*;
use crate::error::{DemuxError, Result};
use crate::utils::{BitReader, ByteQueue};

const PES_PREFIX_SIZE: usize = 6;
const TIMESTAMP_BITS: u32 = 33;

/// Picks the value of `time` (a 33-bit timestamp) closest to `previous`
/// among the previous epoch, the same epoch and the next epoch.
pub fn unroll_timestamp(previous: i64, time: i64) -> i64 {
    let high = previous >> TIMESTAMP_BITS;
    let time0 = ((high - 1) << TIMESTAMP_BITS) | time;
    let time1 = (high << TIMESTAMP_BITS) | time;
    let time2 = ((high + 1) << TIMESTAMP_BITS) | time;

    let diff0 = (time0 - previous).abs();
    let diff1 = (time1 - previous).abs();
    let diff2 = (time2 - previous).abs();

    let (mut unrolled, min_diff) = if diff1 < diff0 {
        (time1, diff1)
    } else {
        (time0, diff0)
    };
    if diff2 < min_diff {
        unrolled = time2;
    }
    unrolled
}

// 40-bit PTS/DTS field: 4-bit prefix, then 3/15/15 bits each followed by a marker.
fn is_timestamp_section_valid(section: u64) -> bool {
    (section & 0x1) != 0 && (section & 0x10000) != 0 && (section & 0x1_0000_0000) != 0
}

fn timestamp_from_section(section: u64) -> i64 {
    let high = (section >> 33) & 0x7;
    let mid = (section >> 17) & 0x7fff;
    let low = (section >> 1) & 0x7fff;
    ((high << 30) | (mid << 15) | low) as i64
}

fn read_timestamp(reader: &mut BitReader, prefix: u64) -> Result<i64> {
    let section = reader.read_bits(40)?;
    if (section >> 36) & 0xf != prefix || !is_timestamp_section_valid(section) {
        return Err(DemuxError::Parser(format!(
            "Invalid PES timestamp section {:#012x}",
            section
        )));
    }
    Ok(timestamp_from_section(section))
}

#[derive(Debug, Default)]
struct TimestampHistory {
    previous_pts: Option<i64>,
    previous_dts: Option<i64>,
}

impl TimestampHistory {
    // Raw 90 kHz values in, unrolled 90 kHz values out.
    fn unroll(&mut self, pts: Option<i64>, dts: Option<i64>) -> (Option<i64>, Option<i64>) {
        let dts = dts.map(|dts| {
            let dts = match self.previous_dts {
                Some(previous) => unroll_timestamp(previous, dts),
                None => dts,
            };
            self.previous_dts = Some(dts);
            dts
        });

        let pts = pts.map(|pts| {
            let pts = match (self.previous_pts, dts) {
                (Some(previous), _) => unroll_timestamp(previous, pts),
                (None, Some(dts)) => unroll_timestamp(dts, pts),
                (None, None) => pts,
            };
            self.previous_pts = Some(pts);
            pts
        });

        (pts, dts)
    }
}

/// Reassembles PES packets and hands their payload to an elementary stream parser.
#[derive(Debug)]
pub struct TsSectionPes {
    queue: ByteQueue,
    waiting_for_unit_start: bool,
    history: TimestampHistory,
    es_parser: EsParser,
}

impl TsSectionPes {
    pub fn new(es_parser: EsParser) -> Self {
        Self {
            queue: ByteQueue::new(),
            waiting_for_unit_start: true,
            history: TimestampHistory::default(),
            es_parser,
        }
    }

    pub fn parse(
        &mut self,
        payload_unit_start: bool,
        buf: &[u8],
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        if self.waiting_for_unit_start && !payload_unit_start {
            return Ok(());
        }

        let mut result = Ok(());
        if payload_unit_start {
            // A PES of unknown length ends where the next one starts.
            if !self.queue.is_empty() {
                result = self.emit(true, events);
            }
            self.reset_pes_state();
            self.waiting_for_unit_start = false;
        }

        if !buf.is_empty() {
            self.queue.push(buf);
        }

        result?;
        self.emit(false, events)
    }

    pub fn flush(&mut self, events: &mut Vec<SectionEvent>) -> Result<()> {
        self.emit(true, events)?;
        self.es_parser.flush(events)
    }

    pub fn reset(&mut self) {
        self.reset_pes_state();
        self.history = TimestampHistory::default();
        self.es_parser.reset();
    }

    fn emit(&mut self, force: bool, events: &mut Vec<SectionEvent>) -> Result<()> {
        let raw = self.queue.peek();
        if raw.len() < PES_PREFIX_SIZE {
            return Ok(());
        }

        let pes_packet_length = ((raw[4] as usize) << 8) | raw[5] as usize;
        if (pes_packet_length == 0 && !force)
            || (pes_packet_length != 0 && raw.len() < pes_packet_length + PES_PREFIX_SIZE)
        {
            return Ok(());
        }
        log::trace!("PES packet of {} bytes (declared {})", raw.len(), pes_packet_length);

        let result = parse_pes_packet(raw, &mut self.history, &mut self.es_parser, events);
        self.reset_pes_state();
        result
    }

    fn reset_pes_state(&mut self) {
        self.queue.reset();
        self.waiting_for_unit_start = true;
    }
}

fn parse_pes_packet(
    raw: &[u8],
    history: &mut TimestampHistory,
    es_parser: &mut EsParser,
    events: &mut Vec<SectionEvent>,
) -> Result<()> {
    let mut reader = BitReader::new(raw);

    let start_code = reader.read_bits(24)? as u32;
    let stream_id = reader.read_bits(8)? as u8;
    let mut pes_packet_length = reader.read_bits(16)? as usize;
    if start_code != PES_START_CODE {
        return Err(DemuxError::Parser(format!(
            "Invalid PES start code {:#08x}",
            start_code
        )));
    }
    if pes_packet_length == 0 {
        pes_packet_length = reader.bits_available() / 8;
    }

    if !is_audio_stream_id(stream_id) && !is_video_stream_id(stream_id) {
        log::trace!("Ignoring PES with stream_id {:#04x}", stream_id);
        return Ok(());
    }

    if reader.read_bits(2)? != 0x2 {
        return Err(DemuxError::Parser("Missing '10' PES header marker".into()));
    }
    // scrambling control, priority, data alignment, copyright, original
    reader.skip_bits(6)?;
    let pts_dts_flags = reader.read_bits(2)?;
    // ESCR, ES rate, DSM trick mode, additional copy info, CRC, extension
    reader.skip_bits(6)?;
    let pes_header_data_length = reader.read_bits(8)? as usize;
    let header_start = reader.bits_available() / 8;

    let es_offset = PES_PREFIX_SIZE + 3 + pes_header_data_length;
    let es_size = pes_packet_length
        .checked_sub(3 + pes_header_data_length)
        .ok_or_else(|| DemuxError::Parser("PES header longer than packet".into()))?;
    if es_offset + es_size > raw.len() {
        return Err(DemuxError::Parser("PES payload overruns buffer".into()));
    }

    let (pts, dts) = match pts_dts_flags {
        0x2 => (Some(read_timestamp(&mut reader, 0x2)?), None),
        0x3 => {
            let pts = read_timestamp(&mut reader, 0x3)?;
            let dts = read_timestamp(&mut reader, 0x1)?;
            (Some(pts), Some(dts))
        }
        _ => (None, None),
    };

    let header_read = header_start - reader.bits_available() / 8;
    if header_read > pes_header_data_length {
        return Err(DemuxError::Parser(
            "PES timestamps overrun pes_header_data_length".into(),
        ));
    }

    let (pts, dts) = history.unroll(pts, dts);
    let pts = pts.map(pts_to_micros);
    let dts = dts.map(pts_to_micros);
    log::trace!(
        "PES stream_id {:#04x}: {} ES bytes, pts {:?}, dts {:?}",
        stream_id,
        es_size,
        pts,
        dts
    );

    es_parser.parse(&raw[es_offset..es_offset + es_size], pts, dts, events)
}
