#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tsdemux::av::{MediaSample, StreamInfo};
use tsdemux::utils::Crc32Mpeg2;
use tsdemux::{DemuxError, MediaParser, Mp2tMediaParser, ParserConfig};

pub const PMT_PID: u16 = 0x20;
pub const ES_PID: u16 = 0x21;
pub const VIDEO_PID: u16 = 0x22;

pub const STREAM_ID_AUDIO: u8 = 0xC0;
pub const STREAM_ID_VIDEO: u8 = 0xE0;

pub const AUD: [u8; 2] = [0x09, 0xF0];
pub const SPS: [u8; 8] = [0x67, 0x42, 0x00, 0x1E, 0xF4, 0x0A, 0x0F, 0xC8];
pub const PPS: [u8; 4] = [0x68, 0xCE, 0x38, 0x80];
pub const IDR: [u8; 5] = [0x65, 0x88, 0x84, 0x21, 0x12];
pub const SLICE: [u8; 4] = [0x41, 0x9A, 0x02, 0x11];

/// Packetizes payloads into 188-byte transport packets, keeping one
/// continuity counter per PID.
#[derive(Debug, Default)]
pub struct TsWriter {
    counters: HashMap<u16, u8>,
    pub output: Vec<u8>,
}

impl TsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, pid: u16, payload: &[u8]) -> &mut Self {
        let mut first = true;
        for chunk in payload.chunks(184) {
            let counter = self.next_counter(pid);
            self.output.extend(ts_packet(pid, first, counter, chunk));
            first = false;
        }
        self
    }

    /// Advances a PID's counter without writing, leaving a gap.
    pub fn skip_counter(&mut self, pid: u16) -> &mut Self {
        self.next_counter(pid);
        self
    }

    /// Like `write`, with the transport_scrambling_control bits set.
    pub fn write_scrambled(&mut self, pid: u16, payload: &[u8]) -> &mut Self {
        let start = self.output.len();
        self.write(pid, payload);
        for packet in self.output[start..].chunks_mut(188) {
            packet[3] |= 0x80;
        }
        self
    }

    pub fn write_pat(&mut self) -> &mut Self {
        self.write(0, &pat(PMT_PID))
    }

    pub fn write_pmt(&mut self, stream_type: u8) -> &mut Self {
        self.write(PMT_PID, &pmt(&[(ES_PID, stream_type)]))
    }

    /// PMT with AAC on `ES_PID` and H.264 on `VIDEO_PID`.
    pub fn write_av_pmt(&mut self) -> &mut Self {
        self.write(PMT_PID, &pmt(&[(ES_PID, 0x0F), (VIDEO_PID, 0x1B)]))
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    fn next_counter(&mut self, pid: u16) -> u8 {
        let counter = self.counters.entry(pid).or_insert(0);
        let current = *counter;
        *counter = (current + 1) % 16;
        current
    }
}

/// One transport packet, padded with adaptation field stuffing.
pub fn ts_packet(pid: u16, pusi: bool, counter: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 184);
    let mut data = vec![0x47, (pid >> 8) as u8 & 0x1F, pid as u8];
    if pusi {
        data[1] |= 0x40;
    }
    let stuffing = 184 - payload.len();
    if stuffing == 0 {
        data.push(0x10 | counter);
    } else {
        data.push(0x30 | counter);
        data.push((stuffing - 1) as u8);
        if stuffing > 1 {
            data.push(0x00);
            data.extend(std::iter::repeat(0xFF).take(stuffing - 2));
        }
    }
    data.extend_from_slice(payload);
    assert_eq!(data.len(), 188);
    data
}

/// Prefixes a section with its pointer_field and appends its CRC.
pub fn psi_payload(mut section: Vec<u8>) -> Vec<u8> {
    let crc = Crc32Mpeg2::new().calculate(&section);
    section.extend_from_slice(&crc.to_be_bytes());
    let mut payload = vec![0x00];
    payload.extend(section);
    payload
}

/// PAT announcing program 1 on `pmt_pid`, with explicit header fields.
pub fn pat_section(
    table_id: u8,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    pmt_pid: u16,
) -> Vec<u8> {
    psi_payload(vec![
        table_id,
        0xB0,
        0x0D,
        0x00,
        0x01,
        0xC1 | (version << 1),
        section_number,
        last_section_number,
        0x00,
        0x01,
        0xE0 | (pmt_pid >> 8) as u8,
        pmt_pid as u8,
    ])
}

pub fn pat_with_table_id(table_id: u8, pmt_pid: u16) -> Vec<u8> {
    pat_section(table_id, 0, 0, 0, pmt_pid)
}

pub fn pat(pmt_pid: u16) -> Vec<u8> {
    pat_with_table_id(0x00, pmt_pid)
}

pub fn pmt(streams: &[(u16, u8)]) -> Vec<u8> {
    let section_length = 9 + 5 * streams.len() + 4;
    let mut section = vec![
        0x02,
        0xB0 | (section_length >> 8) as u8,
        section_length as u8,
        0x00,
        0x01,
        0xC1,
        0x00,
        0x00,
        0xE0 | (ES_PID >> 8) as u8,
        ES_PID as u8,
        0xF0,
        0x00,
    ];
    for &(pid, stream_type) in streams {
        section.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
    }
    psi_payload(section)
}

fn timestamp_field(prefix: u8, ts: i64) -> [u8; 5] {
    [
        (prefix << 4) | (((ts >> 30) & 0x07) as u8) << 1 | 0x01,
        (ts >> 22) as u8,
        (((ts >> 15) & 0x7F) as u8) << 1 | 0x01,
        (ts >> 7) as u8,
        ((ts & 0x7F) as u8) << 1 | 0x01,
    ]
}

/// A PES packet; `bounded` selects a declared length over the "unknown" 0.
pub fn pes(stream_id: u8, pts: Option<i64>, dts: Option<i64>, es: &[u8], bounded: bool) -> Vec<u8> {
    let mut header = Vec::new();
    let flags = match (pts, dts) {
        (Some(pts), Some(dts)) => {
            header.extend_from_slice(&timestamp_field(0x3, pts));
            header.extend_from_slice(&timestamp_field(0x1, dts));
            0xC0
        }
        (Some(pts), None) => {
            header.extend_from_slice(&timestamp_field(0x2, pts));
            0x80
        }
        _ => 0x00,
    };

    let length = if bounded { 3 + header.len() + es.len() } else { 0 };
    let mut data = vec![
        0x00,
        0x00,
        0x01,
        stream_id,
        (length >> 8) as u8,
        length as u8,
        0x80,
        flags,
        header.len() as u8,
    ];
    data.extend(header);
    data.extend_from_slice(es);
    data
}

/// ADTS frame, AAC LC 44.1 kHz stereo, without CRC.
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let len = 7 + payload.len();
    let mut frame = vec![
        0xFF,
        0xF1,
        0x50,
        0x80 | ((len >> 11) & 0x03) as u8,
        (len >> 3) as u8,
        ((len & 0x07) << 5) as u8 | 0x1F,
        0xFC,
    ];
    frame.extend_from_slice(payload);
    frame
}

pub fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        out.extend_from_slice(nal);
    }
    out
}

/// ADTS frame with a reserved sampling frequency index.
pub fn adts_frame_with_frequency_index(payload: &[u8], index: u8) -> Vec<u8> {
    let mut frame = adts_frame(payload);
    frame[2] = (frame[2] & 0xC3) | (index << 2);
    frame
}

/// PES whose start code prefix is wrong, so every copy fails to parse.
pub fn broken_pes() -> Vec<u8> {
    vec![0x00, 0x00, 0x02, STREAM_ID_AUDIO, 0x00, 0x04, 0x01, 0x02, 0x03, 0x04]
}

/// NAL units with 4-byte big-endian length prefixes.
pub fn length_prefixed(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

/// What the parser handed to its callbacks.
#[derive(Debug, Default)]
pub struct Recorded {
    pub inits: Vec<Vec<StreamInfo>>,
    pub samples: Vec<(u32, MediaSample)>,
}

pub fn recording_parser(config: ParserConfig) -> (Mp2tMediaParser, Rc<RefCell<Recorded>>) {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let mut parser = Mp2tMediaParser::new(config);
    let on_init = recorded.clone();
    let on_sample = recorded.clone();
    parser.init(
        Box::new(move |streams: &[StreamInfo]| on_init.borrow_mut().inits.push(streams.to_vec())),
        Box::new(move |track_id: u32, sample: MediaSample| -> Result<(), DemuxError> {
            on_sample.borrow_mut().samples.push((track_id, sample));
            Ok(())
        }),
    );
    (parser, recorded)
}
