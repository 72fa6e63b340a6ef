use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

use super::types::{
    NALUnit, NALUnitType, PPSInfo, SPSInfo, EXTENDED_SAR, HIGH_PROFILES, SAR_TABLE,
};
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;

/// Locates the first Annex-B start code in `data`.
///
/// Returns the offset of the start code and its length (3, or 4 when a zero
/// byte precedes `00 00 01`).
pub fn find_start_code(data: &[u8]) -> Option<(usize, usize)> {
    let pos = data.windows(3).position(|w| w == [0x00, 0x00, 0x01])?;
    if pos > 0 && data[pos - 1] == 0x00 {
        Some((pos - 1, 4))
    } else {
        Some((pos, 3))
    }
}

/// Splits an Annex-B byte stream into NAL units, start codes excluded.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let Some((first, len)) = find_start_code(data) else {
        return units;
    };
    let mut start = first + len;
    loop {
        match find_start_code(&data[start..]) {
            Some((offset, len)) => {
                if offset > 0 {
                    units.push(&data[start..start + offset]);
                }
                start += offset + len;
            }
            None => {
                if start < data.len() {
                    units.push(&data[start..]);
                }
                return units;
            }
        }
    }
}

/// Strips `emulation_prevention_three_byte`s, turning a NAL unit into its RBSP.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    out
}

/// Parses an SPS RBSP (NAL header byte excluded).
pub fn parse_sps(data: &[u8]) -> Result<SPSInfo> {
    log::trace!("Parsing SPS, {} bytes", data.len());
    let mut reader = BitReader::new(data);
    let mut sps = SPSInfo {
        chroma_format_idc: 1,
        ..Default::default()
    };

    sps.profile_idc = reader.read_bits(8)? as u8;
    sps.constraint_set_flags = reader.read_bits(8)? as u8;
    sps.level_idc = reader.read_bits(8)? as u8;
    sps.seq_parameter_set_id = reader.read_golomb()?;
    if sps.seq_parameter_set_id > 31 {
        return Err(DemuxError::Codec(format!(
            "Invalid seq_parameter_set_id {}",
            sps.seq_parameter_set_id
        )));
    }

    if HIGH_PROFILES.contains(&sps.profile_idc) {
        sps.chroma_format_idc = reader.read_golomb()?;
        if sps.chroma_format_idc > 3 {
            return Err(DemuxError::Codec(format!(
                "Invalid chroma_format_idc {}",
                sps.chroma_format_idc
            )));
        }
        if sps.chroma_format_idc == 3 {
            sps.separate_colour_plane = reader.read_bit()?;
        }
        reader.read_golomb()?; // bit_depth_luma_minus8
        reader.read_golomb()?; // bit_depth_chroma_minus8
        reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if reader.read_bit()? {
            let count = if sps.chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..count {
                if reader.read_bit()? {
                    let size = if i < 6 { 16 } else { 64 };
                    skip_scaling_list(&mut reader, size)?;
                }
            }
        }
    }

    reader.read_golomb()?; // log2_max_frame_num_minus4
    let pic_order_cnt_type = reader.read_golomb()?;
    match pic_order_cnt_type {
        0 => {
            reader.read_golomb()?; // log2_max_pic_order_cnt_lsb_minus4
        }
        1 => {
            reader.skip_bits(1)?; // delta_pic_order_always_zero_flag
            reader.read_signed_golomb()?; // offset_for_non_ref_pic
            reader.read_signed_golomb()?; // offset_for_top_to_bottom_field
            let cycle = reader.read_golomb()?;
            if cycle > 255 {
                return Err(DemuxError::Codec(format!(
                    "Invalid num_ref_frames_in_pic_order_cnt_cycle {}",
                    cycle
                )));
            }
            for _ in 0..cycle {
                reader.read_signed_golomb()?;
            }
        }
        2 => {}
        other => {
            return Err(DemuxError::Codec(format!(
                "Invalid pic_order_cnt_type {}",
                other
            )))
        }
    }

    reader.read_golomb()?; // max_num_ref_frames
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    sps.pic_width_in_mbs = reader.read_golomb()? + 1;
    sps.pic_height_in_map_units = reader.read_golomb()? + 1;
    sps.frame_mbs_only = reader.read_bit()?;
    if !sps.frame_mbs_only {
        reader.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.skip_bits(1)?; // direct_8x8_inference_flag

    if reader.read_bit()? {
        sps.frame_crop_left_offset = reader.read_golomb()?;
        sps.frame_crop_right_offset = reader.read_golomb()?;
        sps.frame_crop_top_offset = reader.read_golomb()?;
        sps.frame_crop_bottom_offset = reader.read_golomb()?;
    }

    let (width, height) = sps.cropped_size().ok_or_else(|| {
        DemuxError::Codec(format!(
            "Invalid frame cropping {}/{}/{}/{} for {}x{} macroblocks",
            sps.frame_crop_left_offset,
            sps.frame_crop_right_offset,
            sps.frame_crop_top_offset,
            sps.frame_crop_bottom_offset,
            sps.pic_width_in_mbs,
            sps.pic_height_in_map_units
        ))
    })?;

    if reader.read_bit()? {
        parse_vui(&mut reader, &mut sps)?;
    }

    log::debug!(
        "SPS {}: profile {} level {} {}x{}",
        sps.seq_parameter_set_id,
        sps.profile_idc,
        sps.level_idc,
        width,
        height
    );
    Ok(sps)
}

// Only the fields up to the timing info are needed.
fn parse_vui(reader: &mut BitReader, sps: &mut SPSInfo) -> Result<()> {
    if reader.read_bit()? {
        let aspect_ratio_idc = reader.read_bits(8)? as u8;
        if aspect_ratio_idc == EXTENDED_SAR {
            sps.sar_width = reader.read_bits(16)? as u16;
            sps.sar_height = reader.read_bits(16)? as u16;
        } else if let Some(&(w, h)) = SAR_TABLE.get(aspect_ratio_idc as usize) {
            sps.sar_width = w;
            sps.sar_height = h;
        } else {
            log::warn!("Reserved aspect_ratio_idc {}", aspect_ratio_idc);
        }
    }

    if reader.read_bit()? {
        reader.skip_bits(1)?; // overscan_appropriate_flag
    }

    if reader.read_bit()? {
        reader.skip_bits(4)?; // video_format, video_full_range_flag
        if reader.read_bit()? {
            reader.skip_bits(24)?; // colour primaries, transfer, matrix
        }
    }

    if reader.read_bit()? {
        reader.read_golomb()?; // chroma_sample_loc_type_top_field
        reader.read_golomb()?; // chroma_sample_loc_type_bottom_field
    }

    if reader.read_bit()? {
        sps.num_units_in_tick = reader.read_bits(32)? as u32;
        sps.time_scale = reader.read_bits(32)? as u32;
        sps.fixed_frame_rate = reader.read_bit()?;
    }

    Ok(())
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale = 8;
    let mut next_scale = 8;

    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_golomb()?;
            if !(-128..=127).contains(&delta_scale) {
                return Err(DemuxError::Codec(format!(
                    "Invalid delta_scale {}",
                    delta_scale
                )));
            }
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }

    Ok(())
}

/// Parses a PPS RBSP (NAL header byte excluded).
pub fn parse_pps(data: &[u8]) -> Result<PPSInfo> {
    let mut reader = BitReader::new(data);

    let pic_parameter_set_id = reader.read_golomb()?;
    let seq_parameter_set_id = reader.read_golomb()?;
    let entropy_coding_mode_flag = reader.read_bit()?;

    if pic_parameter_set_id > 255 || seq_parameter_set_id > 31 {
        return Err(DemuxError::Codec(format!(
            "Invalid PPS ids {}/{}",
            pic_parameter_set_id, seq_parameter_set_id
        )));
    }

    Ok(PPSInfo {
        pic_parameter_set_id,
        seq_parameter_set_id,
        entropy_coding_mode_flag,
    })
}

/// Builds an AVCDecoderConfigurationRecord from one SPS and one PPS NAL unit.
pub fn avc_decoder_configuration_record(sps: &[u8], pps: &[u8]) -> Result<Bytes> {
    if sps.len() < 4 {
        return Err(DemuxError::Codec("SPS too short for avcC".into()));
    }
    let sps_len = u16::try_from(sps.len())
        .map_err(|_| DemuxError::Codec("SPS too large for avcC".into()))?;
    let pps_len = u16::try_from(pps.len())
        .map_err(|_| DemuxError::Codec("PPS too large for avcC".into()))?;

    let mut buf = BytesMut::with_capacity(11 + sps.len() + pps.len());
    buf.put_u8(1); // configurationVersion
    buf.put_u8(sps[1]); // AVCProfileIndication
    buf.put_u8(sps[2]); // profile_compatibility
    buf.put_u8(sps[3]); // AVCLevelIndication
    buf.put_u8(0xFF); // 4-byte NAL lengths
    buf.put_u8(0xE1); // one SPS
    buf.put_u16(sps_len);
    buf.put_slice(sps);
    buf.put_u8(1); // one PPS
    buf.put_u16(pps_len);
    buf.put_slice(pps);
    Ok(buf.freeze())
}

/// RFC 6381 codec string, `avc1.PPCCLL`.
pub fn avc_codec_string(sps: &SPSInfo) -> String {
    format!(
        "avc1.{:02X}{:02X}{:02X}",
        sps.profile_idc, sps.constraint_set_flags, sps.level_idc
    )
}

/// Parameter sets selected by the most recent PPS.
#[derive(Debug, Clone)]
pub struct ActiveParameterSets<'a> {
    pub sps: &'a SPSInfo,
    pub sps_nal: &'a Bytes,
    pub pps_nal: &'a Bytes,
}

/// Tracks SPS/PPS NAL units by id across an H.264 stream.
#[derive(Debug, Default)]
pub struct H264Parser {
    sps: BTreeMap<u32, (SPSInfo, Bytes)>,
    pps: BTreeMap<u32, (PPSInfo, Bytes)>,
    last_pps_id: Option<u32>,
}

impl H264Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects one NAL unit (header byte included, start code excluded).
    pub fn parse_nalu(&mut self, data: &[u8]) -> Result<NALUnit> {
        let nalu = NALUnit::new(Bytes::copy_from_slice(data))
            .ok_or_else(|| DemuxError::Codec("Empty NAL unit".into()))?;

        match nalu.unit_type() {
            NALUnitType::SPS => {
                let rbsp = remove_emulation_prevention(&data[1..]);
                let sps = parse_sps(&rbsp)?;
                self.sps
                    .insert(sps.seq_parameter_set_id, (sps, nalu.data.clone()));
            }
            NALUnitType::PPS => {
                let rbsp = remove_emulation_prevention(&data[1..]);
                let pps = parse_pps(&rbsp)?;
                let id = pps.pic_parameter_set_id;
                self.pps.insert(id, (pps, nalu.data.clone()));
                self.last_pps_id = Some(id);
            }
            _ => {}
        }

        Ok(nalu)
    }

    /// The last PPS seen together with the SPS it refers to, if both are known.
    pub fn active_parameter_sets(&self) -> Option<ActiveParameterSets<'_>> {
        let (pps, pps_nal) = self.pps.get(&self.last_pps_id?)?;
        let (sps, sps_nal) = self.sps.get(&pps.seq_parameter_set_id)?;
        Some(ActiveParameterSets {
            sps,
            sps_nal,
            pps_nal,
        })
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active_parameter_sets()
            .map(|sets| (sets.sps.width(), sets.sps.height()))
    }

    pub fn reset(&mut self) {
        self.sps.clear();
        self.pps.clear();
        self.last_pps_id = None;
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::utils::bits::test_utils::{golomb_bits, signed_golomb_bits};
    use pretty_assertions::assert_eq;

    // Baseline profile 66, level 30, 320x240, no VUI
    const SPS: [u8; 8] = [0x67, 0x42, 0x00, 0x1E, 0xF4, 0x0A, 0x0F, 0xC8];
    const PPS: [u8; 4] = [0x68, 0xCE, 0x38, 0x80];

    #[test]
    fn test_remove_emulation_prevention() {
        let input = vec![0x00, 0x00, 0x03, 0x01];
        assert_eq!(remove_emulation_prevention(&input), vec![0x00, 0x00, 0x01]);

        let input = vec![0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x02];
        assert_eq!(
            remove_emulation_prevention(&input),
            vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x02]
        );

        // 00 00 03 00 00 03: both escapes are removed
        let input = vec![0x00, 0x00, 0x03, 0x00, 0x00, 0x03];
        assert_eq!(remove_emulation_prevention(&input), vec![0x00; 4]);

        let input = vec![0x00, 0x01, 0x02, 0x03];
        assert_eq!(remove_emulation_prevention(&input), input);
    }

    #[test]
    fn test_find_start_code() {
        assert_eq!(find_start_code(&[0x00, 0x00, 0x01, 0x09]), Some((0, 3)));
        assert_eq!(find_start_code(&[0x00, 0x00, 0x00, 0x01, 0x09]), Some((0, 4)));
        assert_eq!(find_start_code(&[0xAA, 0x00, 0x00, 0x01]), Some((1, 3)));
        assert_eq!(find_start_code(&[0x00, 0x00, 0x02]), None);
    }

    #[test]
    fn test_split_nal_units() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x09, 0xF0, 0x00, 0x00, 0x01, 0x65, 0x88, 0x00, 0x00, 0x00,
            0x01, 0x41,
        ];
        let units = split_nal_units(&data);
        let expected: Vec<&[u8]> = vec![&[0x09, 0xF0], &[0x65, 0x88], &[0x41]];
        assert_eq!(units, expected);
    }

    #[test]
    fn test_parse_sps() {
        let sps = parse_sps(&SPS[1..]).unwrap();

        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.level_idc, 30);
        assert_eq!(sps.coded_width(), 320);
        assert_eq!(sps.coded_height(), 240);
        assert_eq!(sps.width(), 320);
        assert_eq!(sps.height(), 240);
        assert_eq!(sps.pixel_aspect_ratio(), (1, 1));
        assert_eq!(sps.frame_duration_micros(), None);
        assert_eq!(avc_codec_string(&sps), "avc1.42001E");
    }

    #[test]
    fn test_parse_truncated_sps() {
        assert!(parse_sps(&SPS[1..4]).is_err());
    }

    #[test]
    fn test_cropping() {
        let sps = SPSInfo {
            chroma_format_idc: 1,
            pic_width_in_mbs: 120,
            pic_height_in_map_units: 68,
            frame_mbs_only: true,
            frame_crop_bottom_offset: 4,
            ..Default::default()
        };
        assert_eq!((sps.width(), sps.height()), (1920, 1080));
    }

    #[test]
    fn test_crop_offsets_are_validated() {
        let sps = parse_sps_nal(&cropped_sps_nal(0, 0, 0, 0)).unwrap();
        assert_eq!((sps.width(), sps.height()), (320, 240));

        let sps = parse_sps_nal(&cropped_sps_nal(2, 2, 0, 4)).unwrap();
        assert_eq!((sps.width(), sps.height()), (312, 232));

        // the crop window is wider than the picture
        let err = parse_sps_nal(&cropped_sps_nal(100, 60, 0, 0)).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));

        // the offsets overflow when added together
        let err = parse_sps_nal(&cropped_sps_nal(1 << 31, 1 << 31, 0, 0)).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));
        let err = parse_sps_nal(&cropped_sps_nal(0, 0, 1 << 31, 1 << 31)).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));
    }

    #[test]
    fn test_out_of_range_crop_does_not_panic() {
        let sps = SPSInfo {
            chroma_format_idc: 1,
            pic_width_in_mbs: u32::MAX,
            pic_height_in_map_units: u32::MAX,
            frame_crop_left_offset: u32::MAX,
            frame_crop_right_offset: u32::MAX,
            ..Default::default()
        };
        assert_eq!(sps.cropped_size(), None);
        assert_eq!((sps.width(), sps.height()), (0, 0));
        assert_eq!(sps.coded_width(), u32::MAX);
    }

    fn parse_sps_nal(nal: &[u8]) -> Result<SPSInfo> {
        parse_sps(&remove_emulation_prevention(&nal[1..]))
    }

    fn high_profile_with_scaling_list(deltas: &[i32]) -> Vec<u8> {
        // profile 100, level 30, sps id 0, 4:2:0, 8 bit
        let mut bits = String::from("011001000000000000011110");
        bits.push('1');
        bits.push_str(&golomb_bits(1));
        bits.push_str("110");
        // seq_scaling_matrix_present_flag, then only the first list present
        bits.push_str("11");
        for &delta in deltas {
            bits.push_str(&signed_golomb_bits(delta));
        }
        sps_nal(&bits)
    }

    #[test]
    fn test_scaling_list_delta_out_of_range() {
        let sps = high_profile_with_scaling_list(&[i32::MAX]);
        let err = parse_sps_nal(&sps).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));

        let sps = high_profile_with_scaling_list(&[-129]);
        let err = parse_sps_nal(&sps).unwrap_err();
        assert!(matches!(err, DemuxError::Codec(_)));

        let mut parser = H264Parser::new();
        let sps = high_profile_with_scaling_list(&[i32::MAX]);
        assert!(parser.parse_nalu(&sps).is_err());
    }

    #[test]
    fn test_parse_pps() {
        let pps = parse_pps(&PPS[1..]).unwrap();
        assert_eq!(pps.pic_parameter_set_id, 0);
        assert_eq!(pps.seq_parameter_set_id, 0);
    }

    #[test]
    fn test_parse_nalu() {
        let mut parser = H264Parser::new();

        let nalu = parser.parse_nalu(&[0x01, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(nalu.nal_type, 1);
        assert_eq!(nalu.nal_ref_idc, 0);
        assert!(!nalu.is_keyframe());

        let nalu = parser.parse_nalu(&[0x65, 0x02, 0x03, 0x04]).unwrap();
        assert_eq!(nalu.nal_type, 5);
        assert_eq!(nalu.nal_ref_idc, 3);
        assert!(nalu.is_keyframe());

        assert!(parser.parse_nalu(&[]).is_err());
    }

    #[test]
    fn test_active_parameter_sets() {
        let mut parser = H264Parser::new();
        assert_eq!(parser.dimensions(), None);

        parser.parse_nalu(&SPS).unwrap();
        assert_eq!(parser.dimensions(), None);

        parser.parse_nalu(&PPS).unwrap();
        assert_eq!(parser.dimensions(), Some((320, 240)));

        let sets = parser.active_parameter_sets().unwrap();
        let avcc = avc_decoder_configuration_record(sets.sps_nal, sets.pps_nal).unwrap();
        let mut expected = vec![0x01, 0x42, 0x00, 0x1E, 0xFF, 0xE1, 0x00, 0x08];
        expected.extend_from_slice(&SPS);
        expected.extend_from_slice(&[0x01, 0x00, 0x04]);
        expected.extend_from_slice(&PPS);
        assert_eq!(&avcc[..], &expected[..]);

        parser.reset();
        assert!(parser.active_parameter_sets().is_none());
    }
}
