//! CLI command handlers.

pub mod index;
pub mod search;
pub mod stats;
pub mod version;
