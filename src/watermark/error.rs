//! Watermark error types.

use std::fmt;

/// Errors that can occur while configuring or compositing a watermark.
#[derive(Debug, PartialEq)]
pub enum WatermarkError {
    /// No drawing surface could be set up (no font, undecodable source, encoder failure).
    RenderUnavailable(String),

    /// A watermark setting is outside its domain.
    InvalidConfig(String),

    /// A font file could not be read or parsed.
    FontError(String),
}

impl fmt::Display for WatermarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderUnavailable(msg) => write!(f, "Watermark rendering unavailable: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid watermark setting: {}", msg),
            Self::FontError(msg) => write!(f, "Failed to load watermark font: {}", msg),
        }
    }
}

impl std::error::Error for WatermarkError {}
