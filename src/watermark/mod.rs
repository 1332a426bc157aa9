//! Text watermarks composited onto uploaded images.
//!
//! A [`WatermarkConfig`] is an immutable record; edits arrive as a
//! [`WatermarkPatch`] and go through [`WatermarkConfig::apply_patch`], which
//! validates every present field before building the next config.

pub mod anchor;
pub mod compose;
pub mod error;
pub mod text;

use serde::Deserialize;

use crate::constants::{MAX_FONT_SIZE, MIN_FONT_SIZE};

pub use anchor::{Anchor, HorizontalAlign, TextPlacement, VerticalBaseline};
pub use compose::compose;
pub use error::WatermarkError;
pub use text::{Color, WatermarkFont, parse_hex_color};

/// Watermark settings.
///
/// Deserializing goes through [`WatermarkConfig::apply_patch`] on the
/// defaults, so stored values get the same validation and clamping as edits.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "WatermarkPatch")]
pub struct WatermarkConfig {
    /// Whether the watermark is drawn at all.
    pub enabled: bool,
    /// Text to draw.
    pub text: String,
    /// Placement zone.
    pub anchor: Anchor,
    /// Em size in pixels, within 8..=128.
    pub font_size: u32,
    /// Fill color.
    pub color: Color,
    /// Global alpha, within 0..=1.
    pub opacity: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text: "Your Watermark".to_string(),
            anchor: Anchor::BottomRight,
            font_size: 24,
            color: Color::white(),
            opacity: 0.5,
        }
    }
}

/// A partial update of a [`WatermarkConfig`]; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkPatch {
    /// New enabled flag.
    pub enabled: Option<bool>,
    /// New text.
    pub text: Option<String>,
    /// New anchor name, eg `top-left`.
    pub anchor: Option<String>,
    /// New font size; clamped.
    pub font_size: Option<i64>,
    /// New color as `#RGB`/`#RRGGBB`.
    pub color: Option<String>,
    /// New opacity; clamped.
    pub opacity: Option<f32>,
}

/// Clamps a requested font size into the supported range.
pub fn clamp_font_size(size: i64) -> u32 {
    size.clamp(MIN_FONT_SIZE as i64, MAX_FONT_SIZE as i64) as u32
}

impl TryFrom<WatermarkPatch> for WatermarkConfig {
    type Error = WatermarkError;

    fn try_from(patch: WatermarkPatch) -> Result<Self, Self::Error> {
        Self::default().apply_patch(patch)
    }
}

impl WatermarkConfig {
    /// Whether drawing would change the image.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.text.is_empty()
    }

    /// Validates `patch` and returns the resulting config; `self` is untouched.
    pub fn apply_patch(&self, patch: WatermarkPatch) -> Result<Self, WatermarkError> {
        let anchor = match patch.anchor {
            Some(name) => name.parse()?,
            None => self.anchor,
        };
        let color = match patch.color {
            Some(hex) => parse_hex_color(&hex)?,
            None => self.color,
        };
        let opacity = match patch.opacity {
            Some(value) if !value.is_finite() => {
                return Err(WatermarkError::InvalidConfig(format!(
                    "opacity must be a number, got {value}"
                )));
            }
            Some(value) => value.clamp(0.0, 1.0),
            None => self.opacity,
        };
        let font_size = patch
            .font_size
            .map(clamp_font_size)
            .unwrap_or(self.font_size);

        Ok(Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            text: patch.text.unwrap_or_else(|| self.text.clone()),
            anchor,
            font_size,
            color,
            opacity,
        })
    }
}
