use bytes::Bytes;
use std::collections::VecDeque;

use crate::av::{
    AudioStreamInfo, AudioTimestampHelper, CodecType, MediaSample, StreamInfo, MICROS_PER_SECOND,
};
use crate::codec::aac::{
    adts_frame_size, is_adts_sync_word, parse_adts_header, AACConfig, ADTS_HEADER_MIN_SIZE,
    SAMPLES_PER_AAC_FRAME,
};
use crate::error::{DemuxError, Result};
use crate::format::ts::section::SectionEvent;
use crate::utils::ByteQueue;

/// Returns the position of the next plausible ADTS frame at or after `pos`
/// with its size, or the position scanning should resume from.
fn look_for_sync_word(raw: &[u8], pos: usize) -> (usize, Option<usize>) {
    let max_offset = raw.len().saturating_sub(ADTS_HEADER_MIN_SIZE);
    if pos >= max_offset {
        return (pos, None);
    }

    for offset in pos..max_offset {
        let candidate = &raw[offset..];
        if !is_adts_sync_word(candidate) {
            continue;
        }

        let frame_size = adts_frame_size(candidate);
        if frame_size < ADTS_HEADER_MIN_SIZE {
            continue;
        }

        // A second sync word must follow when enough bytes are buffered.
        if candidate.len() >= frame_size + 2 && !is_adts_sync_word(&candidate[frame_size..]) {
            continue;
        }

        return (offset, Some(frame_size));
    }

    (max_offset, None)
}

/// Splits an ADTS byte stream into AAC frames.
#[derive(Debug)]
pub struct EsParserAdts {
    pid: u16,
    sbr_in_mimetype: bool,
    es_queue: ByteQueue,
    pts_list: VecDeque<(usize, i64)>,
    timestamp_helper: Option<AudioTimestampHelper>,
    last_config: Option<AACConfig>,
}

impl EsParserAdts {
    pub fn new(pid: u16, sbr_in_mimetype: bool) -> Self {
        Self {
            pid,
            sbr_in_mimetype,
            es_queue: ByteQueue::new(),
            pts_list: VecDeque::new(),
            timestamp_helper: None,
            last_config: None,
        }
    }

    pub fn parse(
        &mut self,
        buf: &[u8],
        pts: Option<i64>,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        if let Some(pts) = pts {
            self.pts_list.push_back((self.es_queue.len(), pts));
        }
        self.es_queue.push(buf);

        let mut position = 0;
        loop {
            let raw = self.es_queue.peek();
            let (new_position, frame_size) = look_for_sync_word(raw, position);
            position = new_position;
            let Some(frame_size) = frame_size else {
                break;
            };

            log::trace!("ADTS sync word @ {} frame_size={}", position, frame_size);
            if frame_size > raw.len() - position {
                break;
            }

            let header = parse_adts_header(&raw[position..])?;
            let header_size = header.header_size();
            if frame_size < header_size {
                return Err(DemuxError::InvalidData(format!(
                    "ADTS frame of {} bytes shorter than its header",
                    frame_size
                )));
            }
            if header.number_of_raw_blocks != 0 {
                return Err(DemuxError::Unsupported(format!(
                    "{} raw data blocks in one ADTS frame",
                    header.number_of_raw_blocks + 1
                )));
            }
            let payload_range = position + header_size..position + frame_size;
            let payload = Bytes::copy_from_slice(&raw[payload_range]);

            self.update_audio_configuration(header.config(), events)?;
            self.emit_frame(position, payload, events)?;
            position += frame_size;
        }

        self.discard_es(position)
    }

    pub fn flush(&mut self, _events: &mut Vec<SectionEvent>) -> Result<()> {
        Ok(())
    }

    pub fn reset(&mut self) {
        self.es_queue.reset();
        self.pts_list.clear();
        self.last_config = None;
    }

    fn emit_frame(
        &mut self,
        position: usize,
        payload: Bytes,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        let helper = self
            .timestamp_helper
            .as_mut()
            .ok_or_else(|| DemuxError::Parser("ADTS frame before audio configuration".into()))?;

        while let Some(&(offset, pts)) = self.pts_list.front() {
            if offset > position {
                break;
            }
            helper.set_base_timestamp(pts);
            self.pts_list.pop_front();
        }

        match helper.timestamp() {
            Some(pts) => {
                let duration = helper.frame_duration(SAMPLES_PER_AAC_FRAME);
                events.push(SectionEvent::Sample(
                    MediaSample::new(payload)
                        .with_pts(pts)
                        .with_dts(pts)
                        .with_duration(duration)
                        .with_key_flag(true)
                        .with_track_id(self.pid as u32),
                ));
            }
            None => log::warn!("pid {}: dropping ADTS frame without timestamp", self.pid),
        }

        helper.add_frames(SAMPLES_PER_AAC_FRAME);
        Ok(())
    }

    fn update_audio_configuration(
        &mut self,
        config: AACConfig,
        events: &mut Vec<SectionEvent>,
    ) -> Result<()> {
        let samples_per_second = config.sample_rate().ok_or_else(|| {
            DemuxError::Unsupported(format!(
                "ADTS frequency index {}",
                config.sample_rate_index
            ))
        })?;
        let channels = config.channel_count().ok_or_else(|| {
            DemuxError::Unsupported(format!(
                "ADTS channel configuration {}",
                config.channel_configuration
            ))
        })?;

        if self.last_config == Some(config) {
            return Ok(());
        }

        let extended_samples_per_second = if self.sbr_in_mimetype {
            (2 * samples_per_second).min(48000)
        } else {
            samples_per_second
        };
        log::debug!(
            "pid {}: AAC object type {}, {} Hz (advertised {}), {} channels",
            self.pid,
            config.profile.object_type(),
            samples_per_second,
            extended_samples_per_second,
            channels
        );

        // Keep the running clock across a configuration change.
        let base_timestamp = self.timestamp_helper.as_ref().and_then(|h| h.timestamp());
        let mut helper = AudioTimestampHelper::new(samples_per_second);
        if let Some(base_timestamp) = base_timestamp {
            helper.set_base_timestamp(base_timestamp);
        }
        self.timestamp_helper = Some(helper);
        self.last_config = Some(config);

        events.push(SectionEvent::NewStreamInfo(StreamInfo::Audio(AudioStreamInfo {
            track_id: self.pid as u32,
            codec: CodecType::AAC,
            codec_string: config.codec_string(),
            object_type: config.profile.object_type(),
            sample_rate: extended_samples_per_second,
            channels,
            sample_bits: 16,
            time_scale: MICROS_PER_SECOND as u32,
            extra_data: config.audio_specific_config(),
        })));
        Ok(())
    }

    fn discard_es(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        for entry in self.pts_list.iter_mut() {
            entry.0 = entry.0.saturating_sub(count);
        }
        self.es_queue.pop(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // AAC-LC, frequency index 4 (44.1 kHz), stereo
    fn adts_frame(payload: &[u8]) -> Vec<u8> {
        let frame_size = payload.len() + 7;
        let mut frame = vec![
            0xFF,
            0xF1,
            0x50,
            0x80 | ((frame_size >> 11) & 0x03) as u8,
            (frame_size >> 3) as u8,
            (((frame_size & 0x07) << 5) as u8) | 0x1F,
            0xFC,
        ];
        frame.extend_from_slice(payload);
        frame
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

    fn configs(events: &[SectionEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, SectionEvent::NewStreamInfo(_)))
            .count()
    }

    #[test]
    fn test_frames_get_interpolated_timestamps() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        let mut data = adts_frame(&[1, 2, 3]);
        data.extend(adts_frame(&[4, 5, 6]));
        data.extend(adts_frame(&[7, 8, 9]));

        parser.parse(&data, Some(1_000_000), &mut events).unwrap();

        let samples = samples(&events);
        assert_eq!(configs(&events), 1);
        assert_eq!(samples.len(), 3);
        assert_eq!(&samples[0].data[..], &[1, 2, 3]);
        assert_eq!(samples[0].pts, 1_000_000);
        assert_eq!(samples[1].pts, 1_000_000 + 23_219);
        assert_eq!(samples[2].pts, 1_000_000 + 46_439);
        assert!(samples.iter().all(|s| s.is_key && s.track_id == 0x101));
        assert_eq!(samples[0].duration, 23_219);
    }

    #[test]
    fn test_config_reported_once() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        for i in 0..5 {
            parser
                .parse(&adts_frame(&[i; 4]), Some(i as i64 * 23_219), &mut events)
                .unwrap();
        }
        assert_eq!(configs(&events), 1);

        match &events[0] {
            SectionEvent::NewStreamInfo(StreamInfo::Audio(info)) => {
                assert_eq!(info.codec_string, "mp4a.40.2");
                assert_eq!(info.sample_rate, 44100);
                assert_eq!(info.channels, 2);
                assert_eq!(&info.extra_data[..], &[0x12, 0x10]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_sbr_doubles_advertised_rate() {
        let mut parser = EsParserAdts::new(0x101, true);
        let mut events = Vec::new();
        parser.parse(&adts_frame(&[0; 4]), Some(0), &mut events).unwrap();

        match &events[0] {
            SectionEvent::NewStreamInfo(StreamInfo::Audio(info)) => {
                assert_eq!(info.sample_rate, 48000)
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_partial_frame_waits_for_more_data() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        let frame = adts_frame(&[9; 20]);

        parser.parse(&frame[..12], Some(0), &mut events).unwrap();
        assert!(samples(&events).is_empty());

        parser.parse(&frame[12..], None, &mut events).unwrap();
        assert_eq!(samples(&events).len(), 1);
    }

    #[test]
    fn test_spurious_sync_word_is_skipped() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        // claims an 8-byte frame, but no sync word follows it
        let mut data = vec![0xFF, 0xF1, 0x50, 0x80, 0x01, 0x00, 0x00, 0x11, 0x22, 0x33];
        data.extend(adts_frame(&[1, 2, 3]));
        data.extend(adts_frame(&[4, 5, 6]));

        parser.parse(&data, Some(0), &mut events).unwrap();

        let samples = samples(&events);
        assert_eq!(samples.len(), 2);
        assert_eq!(&samples[0].data[..], &[1, 2, 3]);
        assert_eq!(&samples[1].data[..], &[4, 5, 6]);
    }

    #[test]
    fn test_frames_before_first_pts_are_dropped() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();

        parser.parse(&adts_frame(&[1]), None, &mut events).unwrap();
        parser.parse(&adts_frame(&[2]), Some(5_000), &mut events).unwrap();

        let samples = samples(&events);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].pts, 5_000);
    }

    #[test]
    fn test_invalid_channel_configuration() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        let mut frame = adts_frame(&[1, 2]);
        frame[3] &= 0x3F; // channel configuration 0

        let err = parser.parse(&frame, Some(0), &mut events).unwrap_err();
        assert!(matches!(err, DemuxError::Unsupported(_)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_reserved_frequency_index_is_unsupported() {
        for index in [13u8, 15] {
            let mut parser = EsParserAdts::new(0x101, false);
            let mut events = Vec::new();
            let mut frame = adts_frame(&[1, 2]);
            frame[2] = (frame[2] & 0xC3) | (index << 2);

            let err = parser.parse(&frame, Some(0), &mut events).unwrap_err();
            assert!(matches!(err, DemuxError::Unsupported(_)), "index {}", index);
        }
    }

    #[test]
    fn test_reset_forgets_configuration() {
        let mut parser = EsParserAdts::new(0x101, false);
        let mut events = Vec::new();
        parser.parse(&adts_frame(&[1]), Some(0), &mut events).unwrap();
        parser.reset();
        parser.parse(&adts_frame(&[2]), Some(0), &mut events).unwrap();
        assert_eq!(configs(&events), 2);
    }
}
