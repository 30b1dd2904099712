//! ocrtsv-common — Shared types, errors and text normalization used across all ocrtsv crates.

pub mod error;
pub mod token;
pub mod unicode;

// Re-export commonly used types
pub use error::{OcrTsvError, Result};
pub use token::{format_float, BoundingBox, TokenRow};
pub use unicode::{normalize, UnicodeNormalizer};
