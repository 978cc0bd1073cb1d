//! Message parsing
//!
//! Turns raw stored message text into a [`ParsedMessage`]: headers with
//! folding, addressing fields with defaults, and a display body chosen from
//! multipart alternatives (html preferred, then plain text).

pub mod parser;
pub mod types;

pub use parser::MessageParser;
pub use types::{Headers, ParsedMessage};
