use super::CodecType;
use bytes::Bytes;

/// Decoder configuration of an AAC elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub track_id: u32,
    pub codec: CodecType,
    pub codec_string: String,
    /// MPEG-4 audio object type (2 = AAC LC)
    pub object_type: u8,
    /// Sample rate advertised to the packager (doubled for SBR when configured)
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_bits: u8,
    pub time_scale: u32,
    /// AudioSpecificConfig (ISO 14496-3)
    pub extra_data: Bytes,
}

/// Decoder configuration of an H.264 elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub track_id: u32,
    pub codec: CodecType,
    pub codec_string: String,
    pub profile_idc: u8,
    pub level_idc: u8,
    /// Width and height in macroblock units
    pub coded_width: u32,
    pub coded_height: u32,
    /// Display size after frame cropping
    pub width: u32,
    pub height: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub time_scale: u32,
    /// AVCDecoderConfigurationRecord (ISO 14496-15)
    pub extra_data: Bytes,
}

/// Snapshot of one track's decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamInfo {
    Audio(AudioStreamInfo),
    Video(VideoStreamInfo),
}

impl StreamInfo {
    pub fn track_id(&self) -> u32 {
        match self {
            StreamInfo::Audio(info) => info.track_id,
            StreamInfo::Video(info) => info.track_id,
        }
    }

    pub fn codec_type(&self) -> CodecType {
        match self {
            StreamInfo::Audio(info) => info.codec,
            StreamInfo::Video(info) => info.codec,
        }
    }

    pub fn codec_string(&self) -> &str {
        match self {
            StreamInfo::Audio(info) => &info.codec_string,
            StreamInfo::Video(info) => &info.codec_string,
        }
    }

    pub fn extra_data(&self) -> &[u8] {
        match self {
            StreamInfo::Audio(info) => &info.extra_data,
            StreamInfo::Video(info) => &info.extra_data,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, StreamInfo::Audio(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, StreamInfo::Video(_))
    }
}
