//! Core types shared across the pipeline: typed entity input, text
//! extraction strategies, and content hashing.

pub mod entity;
pub mod extract;
pub mod hash;

pub use entity::EntityDoc;
pub use extract::{ExtractorRegistry, GenericExtractor, TextExtractor};
pub use hash::content_hash;
