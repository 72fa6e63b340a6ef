#![doc(html_root_url = "https://docs.rs/tsdemux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsdemux - MPEG-2 Transport Stream demultiplexer
//!
//! `tsdemux` splits an MPEG-2 Transport Stream into per-track access units with
//! continuous presentation and decode timestamps, ready to be repackaged into
//! another container such as fragmented MP4.
//!
//! ## Features
//!
//! - Byte-level resynchronization on the TS sync byte
//! - PAT/PMT discovery with CRC validation
//! - PES reassembly with 33-bit PTS/DTS wraparound handling
//! - AAC (ADTS) frame extraction with AudioSpecificConfig generation
//! - H.264 (Annex B) access unit extraction with AVCDecoderConfigurationRecord generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::Read;
//! use tsdemux::av::{MediaSample, StreamInfo};
//! use tsdemux::{MediaParser, Mp2tMediaParser, ParserConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut parser = Mp2tMediaParser::new(ParserConfig::from_env());
//!     parser.init(
//!         Box::new(|streams: &[StreamInfo]| {
//!             for stream in streams {
//!                 println!("track {}: {}", stream.track_id(), stream.codec_string());
//!             }
//!         }),
//!         Box::new(|track_id: u32, sample: MediaSample| -> tsdemux::Result<()> {
//!             println!("track {}: pts {} dts {}", track_id, sample.pts, sample.dts);
//!             Ok(())
//!         }),
//!     );
//!
//!     let mut file = File::open("input.ts")?;
//!     let mut chunk = [0u8; 64 * 1024];
//!     loop {
//!         let read = file.read(&mut chunk)?;
//!         if read == 0 {
//!             break;
//!         }
//!         parser.parse(&chunk[..read])?;
//!     }
//!     parser.flush()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: access units, stream configurations and audio timestamp interpolation
//! - `codec`: AAC (ADTS) and H.264 bitstream helpers
//! - `format`: the `MediaParser` trait and the transport stream demuxer
//! - `config`: parser tunables
//! - `error`: error type and `Result` alias
//! - `utils`: bit reader, byte queue and CRC

/// Access units, stream configurations and timestamps
pub mod av;

/// Codec bitstream parsing
pub mod codec;

/// Error types and utilities
pub mod error;

/// Container parsers
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use config::ParserConfig;
pub use error::{DemuxError, Result};
pub use format::{InitCb, MediaParser, NewSampleCb};
pub use format::ts::Mp2tMediaParser;
