use bytes::{BufMut, Bytes, BytesMut};

/// Size of an ADTS header without CRC.
pub const ADTS_HEADER_MIN_SIZE: usize = 7;
/// Size of an ADTS header carrying a CRC.
pub const ADTS_HEADER_CRC_SIZE: usize = 9;
/// Samples per channel in one AAC frame.
pub const SAMPLES_PER_AAC_FRAME: i64 = 1024;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const CHANNEL_COUNTS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 8];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl ProfileType {
    /// MPEG-4 audio object type signalled by this ADTS profile.
    pub fn object_type(self) -> u8 {
        self as u8 + 1
    }
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::LTP,
        }
    }
}

/// The subset of an ADTS header that defines the decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AACConfig {
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
}

impl AACConfig {
    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sample_rate_index as usize).copied()
    }

    pub fn channel_count(&self) -> Option<u8> {
        match CHANNEL_COUNTS.get(self.channel_configuration as usize) {
            Some(0) | None => None,
            Some(count) => Some(*count),
        }
    }

    /// Two-byte AudioSpecificConfig: object type, frequency index, channel configuration.
    pub fn audio_specific_config(&self) -> Bytes {
        let value = (self.profile.object_type() as u16) << 11
            | (self.sample_rate_index as u16 & 0x0F) << 7
            | (self.channel_configuration as u16 & 0x0F) << 3;
        let mut buf = BytesMut::with_capacity(2);
        buf.put_u16(value);
        buf.freeze()
    }

    pub fn codec_string(&self) -> String {
        format!("mp4a.40.{}", self.profile.object_type())
    }
}

#[derive(Debug, Clone)]
pub struct ADTSHeader {
    pub sync_word: u32,            // 12 bits
    pub id: u8,                    // 1 bit, 0=MPEG-4, 1=MPEG-2
    pub layer: u8,                 // 2 bits
    pub protection_absent: bool,   // 1 bit
    pub profile: ProfileType,      // 2 bits
    pub sample_rate_index: u8,     // 4 bits
    pub private_bit: bool,         // 1 bit
    pub channel_configuration: u8, // 3 bits
    pub original_copy: bool,       // 1 bit
    pub home: bool,                // 1 bit
    pub copyright_id_bit: bool,    // 1 bit
    pub copyright_id_start: bool,  // 1 bit
    pub frame_length: u16,         // 13 bits, header included
    pub buffer_fullness: u16,      // 11 bits
    pub number_of_raw_blocks: u8,  // 2 bits, raw data blocks minus one
}

impl ADTSHeader {
    pub fn header_size(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_MIN_SIZE
        } else {
            ADTS_HEADER_CRC_SIZE
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.config().sample_rate()
    }

    pub fn config(&self) -> AACConfig {
        AACConfig {
            profile: self.profile,
            sample_rate_index: self.sample_rate_index,
            channel_configuration: self.channel_configuration,
        }
    }
}
