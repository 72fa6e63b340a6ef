use super::types::{ADTSHeader, ProfileType, ADTS_HEADER_MIN_SIZE};
use crate::error::{DemuxError, Result};
use crate::utils::BitReader;

/// Returns true if `buf` starts with an ADTS sync word: twelve set bits and a zero layer.
///
/// `buf` must hold at least 2 bytes.
pub fn is_adts_sync_word(buf: &[u8]) -> bool {
    buf[0] == 0xFF && (buf[1] & 0xF6) == 0xF0
}

/// Reads the 13-bit frame length of the ADTS header at the start of `buf`.
///
/// `buf` must hold at least 6 bytes.
pub fn adts_frame_size(buf: &[u8]) -> usize {
    ((buf[3] as usize & 0x03) << 11) | ((buf[4] as usize) << 3) | ((buf[5] as usize) >> 5)
}

pub fn parse_adts_header(data: &[u8]) -> Result<ADTSHeader> {
    if data.len() < ADTS_HEADER_MIN_SIZE {
        return Err(DemuxError::Parser("ADTS header too short".into()));
    }

    let mut reader = BitReader::new(data);

    let sync_word = reader.read_bits(12)? as u32;
    if sync_word != 0xFFF {
        return Err(DemuxError::Parser("Invalid ADTS sync word".into()));
    }

    let id = reader.read_bits(1)? as u8;
    let layer = reader.read_bits(2)? as u8;
    let protection_absent = reader.read_bits(1)? == 1;

    let profile = ProfileType::from(reader.read_bits(2)? as u8);

    let sample_rate_index = reader.read_bits(4)? as u8;
    let private_bit = reader.read_bits(1)? == 1;
    let channel_configuration = reader.read_bits(3)? as u8;
    let original_copy = reader.read_bits(1)? == 1;
    let home = reader.read_bits(1)? == 1;

    let copyright_id_bit = reader.read_bits(1)? == 1;
    let copyright_id_start = reader.read_bits(1)? == 1;
    let frame_length = reader.read_bits(13)? as u16;
    let buffer_fullness = reader.read_bits(11)? as u16;
    let number_of_raw_blocks = reader.read_bits(2)? as u8;

    Ok(ADTSHeader {
        sync_word,
        id,
        layer,
        protection_absent,
        profile,
        sample_rate_index,
        private_bit,
        channel_configuration,
        original_copy,
        home,
        copyright_id_bit,
        copyright_id_start,
        frame_length,
        buffer_fullness,
        number_of_raw_blocks,
    })
}
