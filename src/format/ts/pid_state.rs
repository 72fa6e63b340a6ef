use std::collections::VecDeque;

use super::packet::TsPacket;
use super::section::{SectionEvent, TsSection};
use crate::av::{MediaSample, StreamInfo};
use crate::error::DemuxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidType {
    Pat,
    Pmt,
    AudioPes,
    VideoPes,
}

impl PidType {
    pub fn is_elementary_stream(&self) -> bool {
        matches!(self, PidType::AudioPes | PidType::VideoPes)
    }
}

/// Everything the demuxer tracks for one PID.
#[derive(Debug)]
pub struct PidState {
    pid: u16,
    pid_type: PidType,
    section: TsSection,
    enabled: bool,
    continuity_counter: Option<u8>,
    config: Option<StreamInfo>,
    sample_queue: VecDeque<MediaSample>,
    consecutive_errors: u32,
    failed: bool,
}

impl PidState {
    /// Creates an enabled PID bound to `section`.
    pub fn new(pid: u16, pid_type: PidType, section: TsSection) -> Self {
        Self {
            pid,
            pid_type,
            section,
            enabled: true,
            continuity_counter: None,
            config: None,
            sample_queue: VecDeque::new(),
            consecutive_errors: 0,
            failed: false,
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn pid_type(&self) -> PidType {
        self.pid_type
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the PID was disabled after exhausting its error budget.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn config(&self) -> Option<&StreamInfo> {
        self.config.as_ref()
    }

    /// Replaces the decoder configuration, returning whether it changed.
    pub fn set_config(&mut self, config: StreamInfo) -> bool {
        if self.config.as_ref() == Some(&config) {
            return false;
        }
        self.config = Some(config);
        true
    }

    pub fn sample_queue(&mut self) -> &mut VecDeque<MediaSample> {
        &mut self.sample_queue
    }

    /// Checks continuity and hands the packet payload to the section parser.
    ///
    /// Returns `true` when a continuity counter jump was detected; the
    /// section parser is reset and the packet is processed as the first one
    /// after the gap. A PID failing `max_errors` packets in a row is disabled
    /// and reports [`has_failed`](Self::has_failed).
    pub fn push_ts_packet(
        &mut self,
        packet: &TsPacket<'_>,
        max_errors: u32,
        events: &mut Vec<SectionEvent>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        if packet.is_scrambled() {
            log::warn!(
                "pid {}: scrambled packets (control {}) are not supported, disabling",
                self.pid,
                packet.scrambling_control
            );
            self.disable();
            return false;
        }
        // Adaptation-only packets do not advance the counter.
        if !packet.has_payload() {
            return false;
        }

        let mut discontinuity = false;
        if let Some(last) = self.continuity_counter {
            let expected = (last + 1) % 16;
            if packet.continuity_counter != expected {
                if packet.discontinuity_indicator() {
                    log::debug!("pid {}: signaled discontinuity", self.pid);
                } else {
                    log::warn!(
                        "pid {}: continuity counter {} after {}, resetting",
                        self.pid,
                        packet.continuity_counter,
                        last
                    );
                    discontinuity = true;
                }
                self.reset_state();
            }
        }
        self.continuity_counter = Some(packet.continuity_counter);

        match self
            .section
            .parse(packet.payload_unit_start, packet.payload, events)
        {
            Ok(()) => self.consecutive_errors = 0,
            Err(DemuxError::Unsupported(reason)) => {
                log::warn!("pid {}: {}, disabling", self.pid, reason);
                self.disable();
            }
            Err(err) => {
                self.consecutive_errors += 1;
                log::warn!(
                    "pid {}: {} ({} in a row), resetting",
                    self.pid,
                    err,
                    self.consecutive_errors
                );
                self.reset_state();
                if self.consecutive_errors >= max_errors {
                    log::warn!(
                        "pid {}: {} consecutive failures, disabling",
                        self.pid,
                        self.consecutive_errors
                    );
                    self.failed = true;
                    self.disable();
                }
            }
        }

        discontinuity
    }

    /// Forces pending data out of the section parser, then resets it.
    pub fn flush(&mut self, events: &mut Vec<SectionEvent>) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self.section.flush(events) {
            log::warn!("pid {}: flush failed: {}", self.pid, err);
        }
        self.reset_state();
    }

    /// Resets the section parser and ignores further packets.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.reset_state();
        self.enabled = false;
    }

    fn reset_state(&mut self) {
        self.section.reset();
        self.continuity_counter = None;
    }
}
