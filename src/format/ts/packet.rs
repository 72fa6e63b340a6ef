use super::types::*;
use crate::error::{DemuxError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub pcr: Option<u64>,
    pub opcr: Option<u64>,
    pub splice_countdown: Option<i8>,
    pub private_data_length: usize,
    pub extension_length: usize,
}

/// One parsed 188-byte transport packet, borrowing its payload from the input.
#[derive(Debug, Clone)]
pub struct TsPacket<'a> {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub continuity_counter: u8,
    pub adaptation_field: Option<AdaptationField>,
    pub payload: &'a [u8],
    has_payload: bool,
}

impl<'a> TsPacket<'a> {
    /// Parses the packet at the start of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < TS_PACKET_SIZE {
            return Err(DemuxError::InvalidData("TS packet too short".into()));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(DemuxError::InvalidData("Invalid sync byte".into()));
        }
        let data = &data[..TS_PACKET_SIZE];

        let adaptation_field_exists = (data[3] & 0x20) != 0;
        let has_payload = (data[3] & 0x10) != 0;

        let mut packet = TsPacket {
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            continuity_counter: data[3] & 0x0F,
            adaptation_field: None,
            payload: &[],
            has_payload,
        };

        let mut offset = TS_HEADER_SIZE;
        if adaptation_field_exists {
            let length = data[offset] as usize;
            if !has_payload && length != 183 {
                return Err(DemuxError::InvalidData(format!(
                    "Adaptation field length {} without payload",
                    length
                )));
            }
            if has_payload && length > 182 {
                return Err(DemuxError::InvalidData(format!(
                    "Adaptation field length {} too large",
                    length
                )));
            }
            offset += 1;
            if length > 0 {
                packet.adaptation_field =
                    Some(parse_adaptation_field(&data[offset..offset + length])?);
            }
            offset += length;
        }

        if has_payload {
            packet.payload = &data[offset..];
        }

        Ok(packet)
    }

    /// Number of bytes to skip in `data` to reach a position where up to
    /// `count` sync bytes, one packet apart, line up.
    pub fn sync(data: &[u8], count: usize) -> usize {
        let mut skipped = 0;
        while skipped < data.len() {
            let aligned = (0..count)
                .map(|i| skipped + i * TS_PACKET_SIZE)
                .take_while(|&idx| idx < data.len())
                .all(|idx| data[idx] == TS_SYNC_BYTE);
            if aligned {
                break;
            }
            skipped += 1;
        }

        if skipped > 0 {
            log::debug!("TS sync: skipped {} bytes", skipped);
        }
        skipped
    }

    /// Whether the adaptation field control announces a payload.
    pub fn has_payload(&self) -> bool {
        self.has_payload
    }

    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control != 0
    }

    pub fn discontinuity_indicator(&self) -> bool {
        self.adaptation_field
            .as_ref()
            .map_or(false, |field| field.discontinuity)
    }

    pub fn random_access_indicator(&self) -> bool {
        self.adaptation_field
            .as_ref()
            .map_or(false, |field| field.random_access)
    }
}

fn read_clock_reference(data: &[u8]) -> u64 {
    let base = ((data[0] as u64) << 25)
        | ((data[1] as u64) << 17)
        | ((data[2] as u64) << 9)
        | ((data[3] as u64) << 1)
        | ((data[4] & 0x80) as u64 >> 7);
    let ext = (((data[4] & 0x01) as u64) << 8) | (data[5] as u64);
    base * 300 + ext
}

// `data` holds exactly the adaptation field, length byte excluded.
fn parse_adaptation_field(data: &[u8]) -> Result<AdaptationField> {
    let flags = data[0];
    let mut field = AdaptationField {
        length: data.len(),
        discontinuity: (flags & 0x80) != 0,
        random_access: (flags & 0x40) != 0,
        es_priority: (flags & 0x20) != 0,
        ..Default::default()
    };
    let pcr_flag = (flags & 0x10) != 0;
    let opcr_flag = (flags & 0x08) != 0;
    let splicing_point_flag = (flags & 0x04) != 0;
    let private_data_flag = (flags & 0x02) != 0;
    let extension_flag = (flags & 0x01) != 0;

    let mut pos = 1;
    let need = |pos: usize, n: usize, what: &str| -> Result<()> {
        if pos + n > data.len() {
            Err(DemuxError::InvalidData(format!("{} overruns adaptation field", what)))
        } else {
            Ok(())
        }
    };

    if pcr_flag {
        need(pos, 6, "PCR")?;
        field.pcr = Some(read_clock_reference(&data[pos..pos + 6]));
        pos += 6;
    }

    if opcr_flag {
        need(pos, 6, "OPCR")?;
        field.opcr = Some(read_clock_reference(&data[pos..pos + 6]));
        pos += 6;
    }

    if splicing_point_flag {
        need(pos, 1, "Splice countdown")?;
        field.splice_countdown = Some(data[pos] as i8);
        pos += 1;
    }

    if private_data_flag {
        need(pos, 1, "Private data length")?;
        field.private_data_length = data[pos] as usize;
        pos += 1;
        need(pos, field.private_data_length, "Private data")?;
        pos += field.private_data_length;
    }

    if extension_flag {
        need(pos, 1, "Extension length")?;
        field.extension_length = data[pos] as usize;
        pos += 1;
        need(pos, field.extension_length, "Adaptation field extension")?;
        pos += field.extension_length;
    }

    if data[pos..].iter().any(|&b| b != 0xFF) {
        return Err(DemuxError::InvalidData(
            "Adaptation field stuffing is not 0xFF".into(),
        ));
    }

    Ok(field)
}
