use crate::error::{DemuxError, Result};

/// A bit-level reader over a fixed byte span.
///
/// Reads are big-endian, most significant bit first. A read that runs past the
/// end of the data fails and moves the cursor to the end, so every further
/// non-empty read on the same reader fails as well.
///
/// Example:
/// ```
/// use tsdemux::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);    // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// assert!(reader.read_bits(5).is_err());           // only 4 bits left
/// assert!(reader.read_bits(1).is_err());           // sticky
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(self.exhaust("reached end of data"));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits (at most 64) and returns them as a number.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(self.exhaust("too many bits requested"));
        }
        if n as usize > self.bits_available() {
            return Err(self.exhaust("not enough bits left"));
        }

        let mut value = 0u64;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u64;
        }

        Ok(value)
    }

    /// Reads an unsigned exponential Golomb code (ue(v)) as used by H.264.
    ///
    /// M leading zeros, a one, then M INFO bits: value = 2^M + INFO - 1.
    pub fn read_golomb(&mut self) -> Result<u32> {
        let mut leading_zeros = 0;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(self.exhaust("invalid Golomb code"));
            }
        }

        if leading_zeros == 0 {
            return Ok(0);
        }

        let info = self.read_bits(leading_zeros)? as u32;
        Ok(((1u64 << leading_zeros) + info as u64 - 1) as u32)
    }

    /// Reads a signed exponential Golomb code (se(v)).
    ///
    /// Odd codes map to positive values, even codes to negative ones.
    pub fn read_signed_golomb(&mut self) -> Result<i32> {
        let k = self.read_golomb()?;
        if k == 0 {
            return Ok(0);
        }

        let magnitude = ((k as i64 + 1) >> 1) as i32;
        let sign = if k & 1 == 1 { 1 } else { -1 };
        Ok(sign * magnitude)
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        if n > self.bits_available() {
            return Err(self.exhaust("cannot skip past end of data"));
        }
        let position = self.byte_offset * 8 + self.bit_offset as usize + n;
        self.byte_offset = position / 8;
        self.bit_offset = (position % 8) as u8;
        Ok(())
    }

    /// Aligns reader to next byte boundary by skipping remaining bits in current byte.
    pub fn align_byte(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
    }

    /// Returns number of bits available to read.
    pub fn bits_available(&self) -> usize {
        (self.data.len() - self.byte_offset) * 8 - self.bit_offset as usize
    }

    fn exhaust(&mut self, reason: &str) -> DemuxError {
        self.byte_offset = self.data.len();
        self.bit_offset = 0;
        DemuxError::InvalidData(format!("bit reader: {}", reason))
    }
}
