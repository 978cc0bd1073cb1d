//! Utility modules
//!
//! - [`fallback`]: ordered-precedence lookups over optional values

pub mod fallback;

pub use fallback::{first_non_empty, first_non_empty_or};
