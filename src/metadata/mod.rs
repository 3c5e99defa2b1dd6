//! Metadata module
//!
//! `$metadata` parsing and the annotation model it produces

mod annotations;
pub mod model;
pub mod parser;

pub use model::*;
pub use parser::{parse_metadata, MetadataParseError};
