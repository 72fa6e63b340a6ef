//! # Utility Functions and Types
//!
//! Buffering and bit-level helpers shared by the transport stream and codec parsers:
//!
//! - Bit-level reading with Exp-Golomb support
//! - A byte FIFO used to reassemble packets and elementary streams
//! - CRC calculation for PSI sections
//!
//! ## Bit Operations
//!
//! ```rust
//! use tsdemux::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//!
//! // Read specific number of bits
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```
//!
//! ## Byte Queue
//!
//! ```rust
//! use tsdemux::utils::ByteQueue;
//!
//! let mut queue = ByteQueue::new();
//! queue.push(&[0x47, 0x40, 0x00]);
//! queue.pop(1).unwrap();
//! assert_eq!(queue.peek(), &[0x40, 0x00]);
//! ```

/// Bit manipulation and bitstream reading utilities
pub mod bits;

/// Byte FIFO for cross-call buffering
pub mod byte_queue;

/// CRC calculation implementations
pub mod crc;

pub use bits::BitReader;
pub use byte_queue::ByteQueue;
pub use crc::Crc32Mpeg2;
