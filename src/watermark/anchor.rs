//! Anchor resolution for watermark text.
//!
//! Coordinates follow 2D canvas text conventions: the returned point is where
//! the text is drawn, and the alignment/baseline say which part of the text
//! box sits on that point.
//!
//! ```ignore
//! let placement = Anchor::BottomRight.resolve(200, 100, 24);
//! assert_eq!((placement.x, placement.y), (166.0, 66.0)); // 200 - 34, 100 - 34
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::WatermarkError;
use crate::constants::WATERMARK_BASE_MARGIN;

/// One of the nine named placement zones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    /// Top left corner
    TopLeft,
    /// Middle of the top edge
    TopCenter,
    /// Top right corner
    TopRight,
    /// Middle of the left edge
    MiddleLeft,
    /// Geometric center
    Center,
    /// Middle of the right edge
    MiddleRight,
    /// Bottom left corner
    BottomLeft,
    /// Middle of the bottom edge
    BottomCenter,
    /// Bottom right corner
    BottomRight,
}

/// Horizontal alignment of text relative to the anchor point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HorizontalAlign {
    /// Text starts at x
    Left,
    /// Text is centered on x
    Center,
    /// Text ends at x
    Right,
}

/// Vertical baseline of text relative to the anchor point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalBaseline {
    /// Ascent line at y
    Top,
    /// Ascent..descent box centered on y
    Middle,
    /// Descent line at y
    Bottom,
}

/// Where and how text is drawn for an anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextPlacement {
    /// Anchor x in canvas pixels
    pub x: f32,
    /// Anchor y in canvas pixels
    pub y: f32,
    /// Horizontal alignment
    pub align: HorizontalAlign,
    /// Vertical baseline
    pub baseline: VerticalBaseline,
}

impl Anchor {
    /// All anchors in display order.
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::MiddleLeft,
        Anchor::Center,
        Anchor::MiddleRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    /// Wire name, eg `bottom-right`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::TopRight => "top-right",
            Self::MiddleLeft => "middle-left",
            Self::Center => "center",
            Self::MiddleRight => "middle-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }

    /// Human label for form options.
    pub fn label(self) -> &'static str {
        match self {
            Self::TopLeft => "Top Left",
            Self::TopCenter => "Top Center",
            Self::TopRight => "Top Right",
            Self::MiddleLeft => "Middle Left",
            Self::Center => "Center",
            Self::MiddleRight => "Middle Right",
            Self::BottomLeft => "Bottom Left",
            Self::BottomCenter => "Bottom Center",
            Self::BottomRight => "Bottom Right",
        }
    }

    /// Resolves the draw point on a `width`×`height` canvas.
    ///
    /// Edge-adjacent axes sit `10 + font_size` pixels in from the edge; axes
    /// without an edge component use the canvas midpoint.
    pub fn resolve(self, width: u32, height: u32, font_size: u32) -> TextPlacement {
        let margin = (WATERMARK_BASE_MARGIN + font_size) as f32;
        let w = width as f32;
        let h = height as f32;

        let (x, align) = match self {
            Self::TopLeft | Self::MiddleLeft | Self::BottomLeft => (margin, HorizontalAlign::Left),
            Self::TopCenter | Self::Center | Self::BottomCenter => {
                (w / 2.0, HorizontalAlign::Center)
            }
            Self::TopRight | Self::MiddleRight | Self::BottomRight => {
                (w - margin, HorizontalAlign::Right)
            }
        };
        let (y, baseline) = match self {
            Self::TopLeft | Self::TopCenter | Self::TopRight => (margin, VerticalBaseline::Top),
            Self::MiddleLeft | Self::Center | Self::MiddleRight => {
                (h / 2.0, VerticalBaseline::Middle)
            }
            Self::BottomLeft | Self::BottomCenter | Self::BottomRight => {
                (h - margin, VerticalBaseline::Bottom)
            }
        };

        TextPlacement {
            x,
            y,
            align,
            baseline,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = WatermarkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == value.trim())
            .ok_or_else(|| WatermarkError::InvalidConfig(format!("unknown anchor '{value}'")))
    }
}
