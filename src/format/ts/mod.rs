//! # MPEG Transport Stream (TS) Demuxing
//!
//! This module turns an MPEG-2 Transport Stream into timestamped access units:
//!
//! - TS packet parsing and resynchronization
//! - Program Specific Information (PAT/PMT) discovery
//! - Packetized Elementary Stream (PES) reassembly with 33-bit timestamp unrolling
//! - AAC (ADTS) and H.264 (Annex B) access unit segmentation
//!
//! ## Example Usage
//!
//! ```rust
//! use tsdemux::av::{MediaSample, StreamInfo};
//! use tsdemux::format::MediaParser;
//! use tsdemux::format::ts::Mp2tMediaParser;
//! use tsdemux::ParserConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut parser = Mp2tMediaParser::new(ParserConfig::default());
//! parser.init(
//!     Box::new(|streams: &[StreamInfo]| println!("{} streams", streams.len())),
//!     Box::new(|track_id: u32, sample: MediaSample| -> tsdemux::Result<()> {
//!         println!("track {}: {} bytes at {}us", track_id, sample.len(), sample.pts);
//!         Ok(())
//!     }),
//! );
//!
//! // Null packets are skipped
//! let mut null_packet = vec![0xFFu8; 188];
//! null_packet[..4].copy_from_slice(&[0x47, 0x1F, 0xFF, 0x10]);
//! parser.parse(&null_packet)?;
//! parser.flush()?;
//! # Ok(())
//! # }
//! ```

/// Transport stream demuxer driving the PID table
pub mod demuxer;

/// Elementary stream parsers
pub mod es;

/// Transport packet parsing
pub mod packet;

/// PES reassembly and timestamp extraction
pub mod pes;

/// Per-PID state
pub mod pid_state;

/// PAT and PMT parsing
pub mod psi;

/// Section parser dispatch and the events it produces
pub mod section;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use demuxer::Mp2tMediaParser;
pub use es::{EsParser, EsParserAdts, EsParserH264};
pub use packet::{AdaptationField, TsPacket};
pub use pes::{unroll_timestamp, TsSectionPes};
pub use pid_state::{PidState, PidType};
pub use psi::{TsSectionPat, TsSectionPmt};
pub use section::{SectionEvent, TsSection};
pub use types::{PID_PAT, STREAM_TYPE_AAC, STREAM_TYPE_H264, TS_PACKET_SIZE};
