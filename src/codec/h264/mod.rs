//! # H.264/AVC helpers
//!
//! Annex-B start code search, emulation-prevention removal, SPS/PPS parsing
//! and AVCDecoderConfigurationRecord construction.
//!
//! ## Example
//!
//! ```rust
//! use tsdemux::codec::h264::{split_nal_units, H264Parser};
//!
//! # fn main() -> tsdemux::Result<()> {
//! let stream = [
//!     0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E, 0xF4, 0x0A, 0x0F, 0xC8,
//!     0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x38, 0x80,
//! ];
//! let mut parser = H264Parser::new();
//! for nal in split_nal_units(&stream) {
//!     parser.parse_nalu(nal)?;
//! }
//! assert_eq!(parser.dimensions(), Some((320, 240)));
//! # Ok(())
//! # }
//! ```

pub mod parser;
pub mod types;

#[doc(inline)]
pub use parser::*;
#[doc(inline)]
pub use types::*;
