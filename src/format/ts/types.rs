// Stream ID ranges
pub const STREAM_ID_AUDIO_MASK: u8 = 0xe0;
pub const STREAM_ID_AUDIO: u8 = 0xc0;
pub const STREAM_ID_VIDEO_MASK: u8 = 0xf0;
pub const STREAM_ID_VIDEO: u8 = 0xe0;

// PIDs
pub const PID_PAT: u16 = 0x0000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TABLE_ID_STUFFING: u8 = 0xff;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_AAC: u8 = 0x0f;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const PES_START_CODE: u32 = 0x000001;

/// Converts a 90 kHz timestamp to microseconds.
pub fn pts_to_micros(pts: i64) -> i64 {
    pts * 1000 / 90
}

/// Whether a PES stream id falls in the MPEG audio range (`110x xxxx`).
pub fn is_audio_stream_id(stream_id: u8) -> bool {
    stream_id & STREAM_ID_AUDIO_MASK == STREAM_ID_AUDIO
}

/// Whether a PES stream id falls in the MPEG video range (`1110 xxxx`).
pub fn is_video_stream_id(stream_id: u8) -> bool {
    stream_id & STREAM_ID_VIDEO_MASK == STREAM_ID_VIDEO
}
