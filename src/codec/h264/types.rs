use bytes::Bytes;

/// Profiles whose SPS carries chroma format, bit depth and scaling list fields.
pub const HIGH_PROFILES: [u8; 10] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138];

/// Sample aspect ratios indexed by `aspect_ratio_idc` (Table E-1).
pub(crate) const SAR_TABLE: [(u16, u16); 17] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

/// `aspect_ratio_idc` value announcing an explicit SAR.
pub const EXTENDED_SAR: u8 = 255;

#[derive(Debug, Clone)]
pub struct NALUnit {
    pub nal_type: u8,
    pub nal_ref_idc: u8,
    pub data: Bytes,
}

impl NALUnit {
    /// Wraps a NAL unit starting at its header byte. Returns None for an empty slice.
    pub fn new(data: Bytes) -> Option<Self> {
        let header = *data.first()?;
        Some(Self {
            nal_type: header & 0x1F,
            nal_ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    pub fn unit_type(&self) -> NALUnitType {
        NALUnitType::from(self.nal_type)
    }

    pub fn is_keyframe(&self) -> bool {
        self.unit_type() == NALUnitType::CodedSliceIDR
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SPSInfo {
    pub profile_idc: u8,
    pub constraint_set_flags: u8,
    pub level_idc: u8,
    pub seq_parameter_set_id: u32,
    pub chroma_format_idc: u32,
    pub separate_colour_plane: bool,
    pub pic_width_in_mbs: u32,
    pub pic_height_in_map_units: u32,
    pub frame_mbs_only: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,
    pub sar_width: u16,
    pub sar_height: u16,
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate: bool,
}

impl SPSInfo {
    pub fn coded_width(&self) -> u32 {
        self.pic_width_in_mbs.saturating_mul(16)
    }

    pub fn coded_height(&self) -> u32 {
        let field_factor = if self.frame_mbs_only { 1 } else { 2 };
        self.pic_height_in_map_units.saturating_mul(field_factor * 16)
    }

    fn crop_units(&self) -> (u32, u32) {
        let field_factor = if self.frame_mbs_only { 1 } else { 2 };
        if self.chroma_format_idc == 0 || self.separate_colour_plane {
            return (1, field_factor);
        }
        let (sub_width, sub_height) = match self.chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        };
        (sub_width, sub_height * field_factor)
    }

    /// Display size after frame cropping.
    ///
    /// None when the macroblock counts overflow or the crop window leaves no
    /// picture.
    pub fn cropped_size(&self) -> Option<(u32, u32)> {
        let (unit_x, unit_y) = self.crop_units();
        let coded_width = self.pic_width_in_mbs.checked_mul(16)?;
        let field_factor = if self.frame_mbs_only { 1 } else { 2 };
        let coded_height = self.pic_height_in_map_units.checked_mul(field_factor * 16)?;

        let crop_x = self
            .frame_crop_left_offset
            .checked_add(self.frame_crop_right_offset)?
            .checked_mul(unit_x)?;
        let crop_y = self
            .frame_crop_top_offset
            .checked_add(self.frame_crop_bottom_offset)?
            .checked_mul(unit_y)?;
        if crop_x >= coded_width || crop_y >= coded_height {
            return None;
        }
        Some((coded_width - crop_x, coded_height - crop_y))
    }

    /// Display width after frame cropping, 0 for an invalid crop window.
    pub fn width(&self) -> u32 {
        self.cropped_size().map_or(0, |(width, _)| width)
    }

    /// Display height after frame cropping, 0 for an invalid crop window.
    pub fn height(&self) -> u32 {
        self.cropped_size().map_or(0, |(_, height)| height)
    }

    /// Pixel aspect ratio, 1:1 when the VUI does not specify one.
    pub fn pixel_aspect_ratio(&self) -> (u32, u32) {
        if self.sar_width == 0 || self.sar_height == 0 {
            (1, 1)
        } else {
            (self.sar_width as u32, self.sar_height as u32)
        }
    }

    /// Frame duration in microseconds derived from the VUI timing info.
    pub fn frame_duration_micros(&self) -> Option<i64> {
        if self.num_units_in_tick == 0 || self.time_scale == 0 {
            return None;
        }
        Some(1_000_000 * 2 * self.num_units_in_tick as i64 / self.time_scale as i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PPSInfo {
    pub pic_parameter_set_id: u32,
    pub seq_parameter_set_id: u32,
    pub entropy_coding_mode_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified = 0,
    CodedSliceNonIDR = 1,
    CodedSliceDataPartitionA = 2,
    CodedSliceDataPartitionB = 3,
    CodedSliceDataPartitionC = 4,
    CodedSliceIDR = 5,
    SEI = 6,
    SPS = 7,
    PPS = 8,
    AccessUnitDelimiter = 9,
    EndOfSequence = 10,
    EndOfStream = 11,
    FillerData = 12,
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}
