use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;

use crate::av::{CodecType, MediaSample, StreamInfo, VideoStreamInfo, MICROS_PER_SECOND};
use crate::codec::h264::{
    avc_codec_string, avc_decoder_configuration_record, find_start_code, split_nal_units,
    H264Parser, NALUnitType,
};
use crate::error::{DemuxError, Result};
use crate::format::ts::section::SectionEvent;
use crate::utils::ByteQueue;

// Used when neither the VUI nor the stream gives a frame duration.
const DEFAULT_FRAME_DURATION: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timing {
    pts: i64,
    dts: i64,
}

enum AudSearch {
    /// Start code offset and length of the next AUD.
    Found(usize, usize),
    /// No AUD yet; resume scanning from this offset.
    Resume(usize),
}

fn find_aud(raw: &[u8], from: usize) -> AudSearch {
    let mut pos = from;
    while let Some((offset, len)) = find_start_code(&raw[pos..]) {
        let start = pos + offset;
        let header = start + len;
        if header >= raw.len() {
            return AudSearch::Resume(start);
        }
        if NALUnitType::from(raw[header] & 0x1F) == NALUnitType::AccessUnitDelimiter {
            return AudSearch::Found(start, len);
        }
        pos = header;
    }
    // Keep enough bytes to catch a start code split across pushes.
    AudSearch::Resume(raw.len().saturating_sub(4).max(from))
}

/// Splits an H.264 Annex-B byte stream into access units on AUD boundaries.
#[derive(Debug)]
pub struct EsParserH264 {
    pid: u16,
    es_queue: ByteQueue,
    timing_list: VecDeque<(usize, Timing)>,
    parser: H264Parser,
    // The queue starts with the current access unit once one has been seen.
    in_access_unit: bool,
    search_position: usize,
    last_timing: Option<Timing>,
    measured_duration: Option<i64>,
    pending_sample: Option<MediaSample>,
    last_config: Option<VideoStreamInfo>,
}

impl EsParserH264 {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            es_queue: ByteQueue::new(),
            timing_list: VecDeque::new(),
            parser: H264Parser::new(),
            in_access_unit: false,
            search_position: 0,
            last_timing: None,
            measured_duration: None,
            pending_sample: None,
            last_config: None,
        }
    }

    pub fn parse(
        &mut self,
        buf: &[u8],
        pts: Option<i64>,
        dts: Option<i64>,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        if let Some(pts) = pts {
            let timing = Timing {
                pts,
                dts: dts.unwrap_or(pts),
            };
            self.timing_list.push_back((self.es_queue.len(), timing));
        }
        self.es_queue.push(buf);

        loop {
            let raw = self.es_queue.peek();
            match find_aud(raw, self.search_position) {
                AudSearch::Resume(position) => {
                    self.search_position = position;
                    if !self.in_access_unit && position > 0 {
                        log::trace!(
                            "pid {}: discarding {} bytes before first AUD",
                            self.pid,
                            position
                        );
                        self.discard_es(position)?;
                    }
                    return Ok(());
                }
                AudSearch::Found(start, len) => {
                    if self.in_access_unit {
                        let access_unit = Bytes::copy_from_slice(&raw[..start]);
                        self.process_access_unit(access_unit, events)?;
                    } else if start > 0 {
                        log::trace!(
                            "pid {}: discarding {} bytes before first AUD",
                            self.pid,
                            start
                        );
                    }
                    self.discard_es(start)?;
                    self.in_access_unit = true;
                    self.search_position = len;
                }
            }
        }
    }

    /// Closes the access unit still in the queue and emits the delayed sample.
    pub fn flush(&mut self, events: &mut Vec<SectionEvent>) -> Result<()> {
        if self.in_access_unit && !self.es_queue.is_empty() {
            let access_unit = Bytes::copy_from_slice(self.es_queue.peek());
            let size = access_unit.len();
            self.process_access_unit(access_unit, events)?;
            self.discard_es(size)?;
        }
        self.es_queue.reset();
        self.timing_list.clear();
        self.in_access_unit = false;
        self.search_position = 0;

        if let Some(sample) = self.pending_sample.take() {
            let duration = self.frame_duration();
            events.push(SectionEvent::Sample(sample.with_duration(duration)));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.es_queue.reset();
        self.timing_list.clear();
        self.parser.reset();
        self.in_access_unit = false;
        self.search_position = 0;
        self.last_timing = None;
        self.measured_duration = None;
        self.pending_sample = None;
        self.last_config = None;
    }

    /// Parses one Annex-B access unit and queues it as a sample of 4-byte
    /// length-prefixed NAL units, matching the avcC `lengthSizeMinusOne` of 3.
    /// The AUD is dropped.
    fn process_access_unit(
        &mut self,
        access_unit: Bytes,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        let mut is_key = false;
        let mut parameter_sets_changed = false;
        let mut payload = BytesMut::with_capacity(access_unit.len());
        for nal in split_nal_units(&access_unit) {
            let nalu = self.parser.parse_nalu(nal)?;
            match nalu.unit_type() {
                NALUnitType::AccessUnitDelimiter => continue,
                NALUnitType::SPS | NALUnitType::PPS => parameter_sets_changed = true,
                NALUnitType::CodedSliceIDR => is_key = true,
                _ => {}
            }
            let length = u32::try_from(nal.len())
                .map_err(|_| DemuxError::Codec(format!("NAL unit of {} bytes", nal.len())))?;
            payload.put_u32(length);
            payload.put_slice(nal);
        }
        if parameter_sets_changed {
            self.update_video_config(events)?;
        }

        // The access unit starts at offset 0 of the queue.
        let mut timing = None;
        while let Some(&(offset, entry)) = self.timing_list.front() {
            if offset > 0 {
                break;
            }
            timing = Some(entry);
            self.timing_list.pop_front();
        }

        let timing = match (timing, self.last_timing) {
            (Some(timing), _) => timing,
            (None, Some(previous)) => {
                let duration = self.frame_duration();
                Timing {
                    pts: previous.pts + duration,
                    dts: previous.dts + duration,
                }
            }
            (None, None) => {
                log::warn!("pid {}: dropping access unit without timestamp", self.pid);
                return Ok(());
            }
        };
        self.last_timing = Some(timing);

        if let Some(pending) = self.pending_sample.take() {
            let mut duration = timing.dts - pending.dts;
            if duration <= 0 {
                log::warn!(
                    "pid {}: non-increasing DTS {} after {}",
                    self.pid,
                    timing.dts,
                    pending.dts
                );
                duration = DEFAULT_FRAME_DURATION;
            } else {
                self.measured_duration = Some(duration);
            }
            events.push(SectionEvent::Sample(pending.with_duration(duration)));
        }

        log::trace!(
            "pid {}: access unit of {} bytes, pts {} dts {} key {}",
            self.pid,
            payload.len(),
            timing.pts,
            timing.dts,
            is_key
        );
        self.pending_sample = Some(
            MediaSample::new(payload.freeze())
                .with_pts(timing.pts)
                .with_dts(timing.dts)
                .with_key_flag(is_key)
                .with_track_id(self.pid as u32),
        );
        Ok(())
    }

    fn frame_duration(&self) -> i64 {
        self.parser
            .active_parameter_sets()
            .and_then(|sets| sets.sps.frame_duration_micros())
            .filter(|&duration| duration > 0)
            .or(self.measured_duration)
            .unwrap_or(DEFAULT_FRAME_DURATION)
    }

    fn update_video_config(&mut self, events: &mut Vec<SectionEvent>) -> Result<()> {
        let Some(sets) = self.parser.active_parameter_sets() else {
            return Ok(());
        };
        let sps = sets.sps;
        let (pixel_width, pixel_height) = sps.pixel_aspect_ratio();

        let info = VideoStreamInfo {
            track_id: self.pid as u32,
            codec: CodecType::H264,
            codec_string: avc_codec_string(sps),
            profile_idc: sps.profile_idc,
            level_idc: sps.level_idc,
            coded_width: sps.coded_width(),
            coded_height: sps.coded_height(),
            width: sps.width(),
            height: sps.height(),
            pixel_width,
            pixel_height,
            time_scale: MICROS_PER_SECOND as u32,
            extra_data: avc_decoder_configuration_record(sets.sps_nal, sets.pps_nal)?,
        };
        if self.last_config.as_ref() == Some(&info) {
            return Ok(());
        }

        log::debug!(
            "pid {}: {} {}x{} (coded {}x{})",
            self.pid,
            info.codec_string,
            info.width,
            info.height,
            info.coded_width,
            info.coded_height
        );
        self.last_config = Some(info.clone());
        events.push(SectionEvent::NewStreamInfo(StreamInfo::Video(info)));
        Ok(())
    }

    fn discard_es(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        for entry in self.timing_list.iter_mut() {
            entry.0 = entry.0.saturating_sub(count);
        }
        self.search_position = self.search_position.saturating_sub(count);
        self.es_queue.pop(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::h264::parser::test_utils::cropped_sps_nal;
    use pretty_assertions::assert_eq;

    const AUD: [u8; 2] = [0x09, 0xF0];
    const SPS: [u8; 8] = [0x67, 0x42, 0x00, 0x1E, 0xF4, 0x0A, 0x0F, 0xC8];
    const PPS: [u8; 4] = [0x68, 0xCE, 0x38, 0x80];
    const IDR: [u8; 5] = [0x65, 0x88, 0x84, 0x21, 0x12];
    const SLICE: [u8; 4] = [0x41, 0x9A, 0x02, 0x11];

    fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            out.extend_from_slice(nal);
        }
        out
    }

    fn length_prefixed(nals: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for nal in nals {
            out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
            out.extend_from_slice(nal);
        }
        out
    }

    fn samples(events: &[SectionEvent]) -> Vec<MediaSample> {
        events
            .iter()
            .filter_map(|event| match event {
                SectionEvent::Sample(sample) => Some(sample.clone()),
                _ => None,
            })
            .collect()
    }

    fn configs(events: &[SectionEvent]) -> Vec<VideoStreamInfo> {
        events
            .iter()
            .filter_map(|event| match event {
                SectionEvent::NewStreamInfo(StreamInfo::Video(info)) => Some(info.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_access_units_are_emitted_one_behind() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();
        let au1 = annex_b(&[&AUD, &SPS, &PPS, &IDR]);
        let au2 = annex_b(&[&AUD, &SLICE]);

        parser.parse(&au1, Some(100_000), Some(66_667), &mut events).unwrap();
        assert!(samples(&events).is_empty());

        // au1 is closed by the second AUD but held until its duration is known
        parser.parse(&au2, Some(133_333), Some(100_000), &mut events).unwrap();
        assert!(samples(&events).is_empty());

        parser.flush(&mut events).unwrap();
        let emitted = samples(&events);
        assert_eq!(emitted.len(), 2);
        assert_eq!(&emitted[0].data[..], &length_prefixed(&[&SPS, &PPS, &IDR])[..]);
        assert!(emitted[0].is_key);
        assert_eq!(emitted[0].pts, 100_000);
        assert_eq!(emitted[0].dts, 66_667);
        assert_eq!(emitted[0].duration, 33_333);
        assert_eq!(&emitted[1].data[..], &length_prefixed(&[&SLICE])[..]);
        assert!(!emitted[1].is_key);
        assert_eq!(emitted[1].duration, 33_333);

        // a second flush has nothing left
        parser.flush(&mut events).unwrap();
        assert_eq!(samples(&events).len(), 2);
    }

    #[test]
    fn test_video_config() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();
        let au = annex_b(&[&AUD, &SPS, &PPS, &IDR]);

        parser.parse(&au, Some(0), None, &mut events).unwrap();
        parser.parse(&au, Some(40_000), None, &mut events).unwrap();
        parser.flush(&mut events).unwrap();

        let configs = configs(&events);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].codec_string, "avc1.42001E");
        assert_eq!((configs[0].width, configs[0].height), (320, 240));
        assert_eq!((configs[0].pixel_width, configs[0].pixel_height), (1, 1));
        assert_eq!(configs[0].extra_data[0], 1);
        assert_eq!(samples(&events).len(), 2);
    }

    #[test]
    fn test_dts_defaults_to_pts() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();

        parser.parse(&annex_b(&[&AUD, &IDR]), Some(5_000), None, &mut events).unwrap();
        parser.flush(&mut events).unwrap();

        let emitted = samples(&events);
        assert_eq!(emitted[0].dts, 5_000);
        assert_eq!(emitted[0].duration, DEFAULT_FRAME_DURATION);
    }

    #[test]
    fn test_untimed_access_units() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();

        // no timing yet: dropped
        parser.parse(&annex_b(&[&AUD, &SLICE]), None, None, &mut events).unwrap();
        parser.parse(&annex_b(&[&AUD, &IDR]), Some(0), None, &mut events).unwrap();
        parser.parse(&annex_b(&[&AUD, &SLICE]), Some(40_000), None, &mut events).unwrap();
        // inherits previous timing plus the measured duration
        parser.parse(&annex_b(&[&AUD, &SLICE]), None, None, &mut events).unwrap();
        parser.flush(&mut events).unwrap();

        let pts: Vec<i64> = samples(&events).iter().map(|s| s.pts).collect();
        assert_eq!(pts, vec![0, 40_000, 80_000]);
    }

    #[test]
    fn test_leading_bytes_and_split_start_codes() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();
        let mut stream = vec![0xAB, 0xCD, 0x00];
        stream.extend(annex_b(&[&AUD, &IDR]));
        stream.extend(annex_b(&[&AUD, &SLICE]));

        parser.parse(&stream[..9], Some(0), None, &mut events).unwrap();
        for byte in &stream[9..] {
            parser.parse(&[*byte], None, None, &mut events).unwrap();
        }
        parser.flush(&mut events).unwrap();

        let emitted = samples(&events);
        assert_eq!(emitted.len(), 2);
        assert_eq!(&emitted[0].data[..], &length_prefixed(&[&IDR])[..]);
        assert_eq!(&emitted[1].data[..], &length_prefixed(&[&SLICE])[..]);
    }

    #[test]
    fn test_sample_layout_matches_avcc_length_size() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();
        parser.parse(&annex_b(&[&AUD, &SPS, &PPS, &IDR]), Some(0), None, &mut events).unwrap();
        parser.flush(&mut events).unwrap();

        let config = &configs(&events)[0];
        let length_size = (config.extra_data[4] & 0x03) as usize + 1;
        assert_eq!(length_size, 4);

        // walking the sample with the announced length size visits every NAL unit
        let sample = &samples(&events)[0];
        let mut nal_types = Vec::new();
        let mut rest = &sample.data[..];
        while !rest.is_empty() {
            let (length, tail) = rest.split_at(length_size);
            let length = u32::from_be_bytes([length[0], length[1], length[2], length[3]]) as usize;
            nal_types.push(tail[0] & 0x1F);
            rest = &tail[length..];
        }
        assert_eq!(nal_types, vec![7, 8, 5]);
    }

    #[test]
    fn test_overflowing_crop_is_rejected() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();
        let sps = cropped_sps_nal(1 << 31, 1 << 31, 0, 0);

        parser.parse(&annex_b(&[&AUD, &sps, &PPS, &IDR]), Some(0), None, &mut events).unwrap();
        let err = parser.flush(&mut events).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));
        assert!(configs(&events).is_empty());
        assert!(samples(&events).is_empty());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut parser = EsParserH264::new(0x100);
        let mut events = Vec::new();

        parser.parse(&annex_b(&[&AUD, &SPS, &PPS, &IDR]), Some(0), None, &mut events).unwrap();
        parser.reset();
        parser.flush(&mut events).unwrap();
        assert!(samples(&events).is_empty());
    }
}
