use std::collections::{BTreeMap, BTreeSet};

use super::es::EsParser;
use super::packet::TsPacket;
use super::pes::TsSectionPes;
use super::pid_state::{PidState, PidType};
use super::psi::{TsSectionPat, TsSectionPmt};
use super::section::{SectionEvent, TsSection};
use super::types::*;
use crate::av::StreamInfo;
use crate::config::ParserConfig;
use crate::error::{DemuxError, Result};
use crate::format::{InitCb, MediaParser, NewSampleCb};
use crate::utils::ByteQueue;

/// MPEG-2 Transport Stream demuxer.
///
/// Bytes are pushed with [`parse`](MediaParser::parse) in chunks of any size.
/// The demuxer follows the PAT to the first program's PMT, creates one
/// elementary stream parser per AAC or H.264 PID, and reports:
/// - all decoder configurations at once through the init callback, as soon as
///   every elementary stream has one
/// - each access unit through the sample callback, in PID order, once
///   initialization is complete
pub struct Mp2tMediaParser {
    config: ParserConfig,
    init_cb: Option<InitCb>,
    new_sample_cb: Option<NewSampleCb>,
    ts_byte_queue: ByteQueue,
    pids: BTreeMap<u16, PidState>,
    initialized: bool,
    discontinuity_count: u64,
    ignored_stream_types: BTreeSet<u8>,
}

impl Default for Mp2tMediaParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl Mp2tMediaParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            init_cb: None,
            new_sample_cb: None,
            ts_byte_queue: ByteQueue::new(),
            pids: BTreeMap::new(),
            initialized: false,
            discontinuity_count: 0,
            ignored_stream_types: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Whether the init callback has fired.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of continuity counter gaps seen so far, across all PIDs.
    pub fn discontinuity_count(&self) -> u64 {
        self.discontinuity_count
    }

    fn process_packet(&mut self, packet: &TsPacket<'_>) -> Result<()> {
        if packet.pid == PID_PAT && !self.pids.contains_key(&PID_PAT) {
            log::debug!("Creating PAT parser");
            self.pids.insert(
                PID_PAT,
                PidState::new(PID_PAT, PidType::Pat, TsSection::Pat(TsSectionPat::new())),
            );
        }

        let Some(pid_state) = self.pids.get_mut(&packet.pid) else {
            log::trace!("Ignoring packet for pid {:#x}", packet.pid);
            return Ok(());
        };
        log::trace!(
            "pid {:#x}: packet cc {} unit start {} payload {}",
            packet.pid,
            packet.continuity_counter,
            packet.payload_unit_start,
            packet.payload.len()
        );

        let mut events = Vec::new();
        let max_errors = self.config.max_consecutive_errors;
        if pid_state.push_ts_packet(packet, max_errors, &mut events) {
            self.discontinuity_count += 1;
        }
        let failed = pid_state.has_failed();
        self.apply_events(packet.pid, events)?;

        if failed && !self.has_active_elementary_stream() {
            let err = DemuxError::TooManyErrors {
                pid: packet.pid,
                count: max_errors,
            };
            log::error!("{}, no elementary stream left", err);
            return Err(err);
        }
        Ok(())
    }

    fn has_active_elementary_stream(&self) -> bool {
        self.pids
            .values()
            .any(|state| state.pid_type().is_elementary_stream() && state.is_enabled())
    }

    fn apply_events(&mut self, source_pid: u16, events: Vec<SectionEvent>) -> Result<()> {
        for event in events {
            match event {
                SectionEvent::RegisterPmt {
                    program_number,
                    pmt_pid,
                } => self.register_pmt(program_number, pmt_pid),
                SectionEvent::RegisterPes { pid, stream_type } => {
                    self.register_pes(pid, stream_type)
                }
                SectionEvent::NewStreamInfo(info) => self.on_new_stream_info(source_pid, info),
                SectionEvent::Sample(sample) => match self.pids.get_mut(&source_pid) {
                    Some(pid_state) => pid_state.sample_queue().push_back(sample),
                    None => log::error!("No PID state for sample on pid {:#x}", source_pid),
                },
            }
        }
        self.finish_initialization_if_needed();
        Ok(())
    }

    fn register_pmt(&mut self, program_number: u16, pmt_pid: u16) {
        if let Some(existing) = self
            .pids
            .values()
            .find(|state| state.pid_type() == PidType::Pmt)
        {
            if existing.pid() != pmt_pid {
                log::debug!(
                    "Ignoring program {} (PMT pid {:#x}): only one program is demuxed",
                    program_number,
                    pmt_pid
                );
            }
            return;
        }
        if self.pids.contains_key(&pmt_pid) {
            log::warn!("PMT pid {:#x} is already in use", pmt_pid);
            return;
        }

        log::debug!("Program {}: PMT on pid {:#x}", program_number, pmt_pid);
        self.pids.insert(
            pmt_pid,
            PidState::new(pmt_pid, PidType::Pmt, TsSection::Pmt(TsSectionPmt::new())),
        );
    }

    fn register_pes(&mut self, pes_pid: u16, stream_type: u8) {
        if self.pids.contains_key(&pes_pid) {
            return;
        }
        let Some(es_parser) = EsParser::for_stream_type(stream_type, pes_pid, &self.config) else {
            if self.ignored_stream_types.insert(stream_type) {
                log::warn!(
                    "Ignoring pid {:#x}: unsupported stream type {:#04x}",
                    pes_pid,
                    stream_type
                );
            }
            return;
        };

        let pid_type = if es_parser.is_audio() {
            PidType::AudioPes
        } else {
            PidType::VideoPes
        };
        log::debug!(
            "Elementary stream on pid {:#x}, stream type {:#04x}",
            pes_pid,
            stream_type
        );
        self.pids.insert(
            pes_pid,
            PidState::new(
                pes_pid,
                pid_type,
                TsSection::Pes(Box::new(TsSectionPes::new(es_parser))),
            ),
        );
    }

    fn on_new_stream_info(&mut self, pid: u16, info: StreamInfo) {
        let Some(pid_state) = self.pids.get_mut(&pid) else {
            log::error!("No PID state for new stream on pid {:#x}", pid);
            return;
        };
        let codec_string = info.codec_string().to_string();
        if pid_state.set_config(info) && self.initialized {
            log::debug!("pid {:#x}: configuration changed to {}", pid, codec_string);
        }
    }

    fn finish_initialization_if_needed(&mut self) {
        if self.initialized {
            return;
        }

        let mut num_es = 0;
        let mut all_stream_info = Vec::new();
        for pid_state in self.pids.values() {
            if !pid_state.pid_type().is_elementary_stream() || !pid_state.is_enabled() {
                continue;
            }
            num_es += 1;
            if let Some(config) = pid_state.config() {
                all_stream_info.push(config.clone());
            }
        }
        if num_es == 0 || all_stream_info.len() != num_es {
            return;
        }

        if let Some(init_cb) = self.init_cb.as_mut() {
            init_cb(all_stream_info.as_slice());
        }
        self.initialized = true;
        log::debug!("Initialization done with {} streams", num_es);
    }

    fn emit_remaining_samples(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let Some(new_sample_cb) = self.new_sample_cb.as_mut() else {
            return Err(DemuxError::NotInitialized);
        };

        for (pid, pid_state) in self.pids.iter_mut() {
            while let Some(sample) = pid_state.sample_queue().pop_front() {
                new_sample_cb(*pid as u32, sample).map_err(|err| match err {
                    DemuxError::Sink(_) => err,
                    other => DemuxError::Sink(other.to_string()),
                })?;
            }
        }
        Ok(())
    }
}

impl MediaParser for Mp2tMediaParser {
    fn init(&mut self, init_cb: InitCb, new_sample_cb: NewSampleCb) {
        if self.init_cb.is_some() {
            log::warn!("Mp2tMediaParser initialized twice, replacing callbacks");
        }
        self.init_cb = Some(init_cb);
        self.new_sample_cb = Some(new_sample_cb);
    }

    fn parse(&mut self, buf: &[u8]) -> Result<()> {
        if self.init_cb.is_none() || self.new_sample_cb.is_none() {
            return Err(DemuxError::NotInitialized);
        }
        self.ts_byte_queue.push(buf);

        let mut packet_buf = [0u8; TS_PACKET_SIZE];
        loop {
            let raw = self.ts_byte_queue.peek();
            if raw.len() < TS_PACKET_SIZE {
                break;
            }

            let skipped = TsPacket::sync(raw, self.config.sync_packet_count);
            if skipped > 0 {
                log::warn!("Packet not aligned on a sync byte, skipped {} bytes", skipped);
                self.ts_byte_queue.pop(skipped)?;
                continue;
            }

            packet_buf.copy_from_slice(&raw[..TS_PACKET_SIZE]);
            let packet = match TsPacket::parse(&packet_buf) {
                Ok(packet) => packet,
                Err(err) => {
                    log::debug!("Invalid TS packet: {}", err);
                    self.ts_byte_queue.pop(1)?;
                    continue;
                }
            };
            self.ts_byte_queue.pop(TS_PACKET_SIZE)?;
            self.process_packet(&packet)?;
        }

        self.emit_remaining_samples()
    }

    fn flush(&mut self) -> Result<()> {
        log::debug!("Flushing {} pids", self.pids.len());

        let pids: Vec<u16> = self.pids.keys().copied().collect();
        for pid in pids {
            let mut events = Vec::new();
            if let Some(pid_state) = self.pids.get_mut(&pid) {
                pid_state.flush(&mut events);
            }
            self.apply_events(pid, events)?;
        }

        let result = self.emit_remaining_samples();
        if !self.initialized {
            let dropped: usize = self
                .pids
                .values_mut()
                .map(|pid_state| pid_state.sample_queue().len())
                .sum();
            if dropped > 0 {
                log::warn!("Dropping {} samples: streams never initialized", dropped);
            }
        }
        self.pids.clear();
        self.ts_byte_queue.reset();
        result
    }
}
