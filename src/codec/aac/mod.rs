//! AAC helpers: ADTS header parsing and AudioSpecificConfig construction.

pub mod parser;
pub mod types;

pub use parser::*;
pub use types::*;
