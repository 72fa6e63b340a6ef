//! Codec bitstream helpers used by the elementary stream parsers.

pub mod aac;
pub mod h264;
