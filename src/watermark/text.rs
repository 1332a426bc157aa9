//! Text rasterizing for watermarks.
//!
//! Glyphs are rasterized with `ab_glyph` into a coverage mask covering the
//! text's bounding box, then blended onto the canvas once, so overlapping
//! glyph edges are not painted twice.

use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, OutlinedGlyph, PxScale, Rect, ScaleFont, point};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::WatermarkError;
use super::anchor::{HorizontalAlign, TextPlacement, VerticalBaseline};

/// Bold face used when no font path is configured (DejaVu Sans Bold, see
/// `assets/fonts/LICENSE-DejaVu.txt`).
const EMBEDDED_FONT_DATA: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans-Bold.ttf"
));

/// An RGB fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Builds a color from components.
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Formats as `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse a hex color string (`#RGB` or `#RRGGBB`) into RGB components.
pub fn parse_hex_color(hex: &str) -> Result<Color, WatermarkError> {
    let hex = hex
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| WatermarkError::InvalidConfig("color must start with '#'".to_string()))?;
    let invalid = || WatermarkError::InvalidConfig(format!("invalid hex color '#{hex}'"));
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let digit = |range: std::ops::Range<usize>| {
        u8::from_str_radix(hex.get(range).ok_or_else(invalid)?, 16).map_err(|_| invalid())
    };

    match hex.len() {
        // #RGB doubles each digit: 0xA -> 0xAA
        3 => Ok(Color::new(digit(0..1)? * 17, digit(1..2)? * 17, digit(2..3)? * 17)),
        6 => Ok(Color::new(digit(0..2)?, digit(2..4)?, digit(4..6)?)),
        _ => Err(invalid()),
    }
}

/// The part of the canvas covered by the text, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MaskArea {
    left: i64,
    top: i64,
    width: usize,
    height: usize,
}

impl MaskArea {
    /// Clips `bounds` to a `canvas_w` x `canvas_h` canvas; `None` when nothing is left.
    fn clipped(bounds: Rect, canvas_w: u32, canvas_h: u32) -> Option<Self> {
        let left = bounds.min.x.floor().max(0.0) as i64;
        let top = bounds.min.y.floor().max(0.0) as i64;
        let right = (bounds.max.x.ceil() as i64).min(i64::from(canvas_w));
        let bottom = (bounds.max.y.ceil() as i64).min(i64::from(canvas_h));
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self {
            left,
            top,
            width: (right - left) as usize,
            height: (bottom - top) as usize,
        })
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let (dx, dy) = (x - self.left, y - self.top);
        if dx < 0 || dy < 0 || dx >= self.width as i64 || dy >= self.height as i64 {
            return None;
        }
        Some(dy as usize * self.width + dx as usize)
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    Rect {
        min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
        max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
    }
}

/// A loaded font face for watermark text.
#[derive(Clone, Debug)]
pub struct WatermarkFont {
    font: FontArc,
}

impl WatermarkFont {
    /// The embedded bold face.
    pub fn embedded() -> Result<Self, WatermarkError> {
        FontArc::try_from_slice(EMBEDDED_FONT_DATA)
            .map(|font| Self { font })
            .map_err(|err| WatermarkError::FontError(err.to_string()))
    }

    /// Reads a TTF/OTF file.
    pub fn from_path(path: &Path) -> Result<Self, WatermarkError> {
        let data = std::fs::read(path)
            .map_err(|err| WatermarkError::FontError(format!("{}: {err}", path.display())))?;
        FontArc::try_from_vec(data)
            .map(|font| Self { font })
            .map_err(|err| WatermarkError::FontError(format!("{}: {err}", path.display())))
    }

    /// Uses `path` when given, otherwise the embedded face.
    pub fn load(path: Option<&Path>) -> Result<Self, WatermarkError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::embedded(),
        }
    }

    /// Scale where `font_size` is the em size, as CSS `px` font sizes are.
    fn scale(&self, font_size: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(font_size * self.font.height_unscaled() / units_per_em)
    }

    /// Advance width of `text` in pixels.
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(self.scale(font_size));
        let mut width = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Draws `text` onto `canvas` at `placement`, blending with `opacity`.
    pub(crate) fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        font_size: f32,
        color: Color,
        opacity: f32,
        placement: TextPlacement,
    ) {
        let scale = self.scale(font_size);
        let scaled = self.font.as_scaled(scale);
        let width = self.measure(text, font_size);

        let origin_x = match placement.align {
            HorizontalAlign::Left => placement.x,
            HorizontalAlign::Center => placement.x - width / 2.0,
            HorizontalAlign::Right => placement.x - width,
        };
        // descent is negative
        let baseline_y = match placement.baseline {
            VerticalBaseline::Top => placement.y + scaled.ascent(),
            VerticalBaseline::Middle => placement.y + (scaled.ascent() + scaled.descent()) / 2.0,
            VerticalBaseline::Bottom => placement.y + scaled.descent(),
        };

        let mut glyphs: Vec<OutlinedGlyph> = Vec::new();
        let mut cursor_x = origin_x;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                cursor_x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(cursor_x, baseline_y));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                glyphs.push(outlined);
            }
            cursor_x += scaled.h_advance(id);
            prev = Some(id);
        }

        let (canvas_w, canvas_h) = canvas.dimensions();
        let Some(area) = glyphs
            .iter()
            .map(OutlinedGlyph::px_bounds)
            .reduce(union)
            .and_then(|bounds| MaskArea::clipped(bounds, canvas_w, canvas_h))
        else {
            return;
        };

        let mut coverage = vec![0.0f32; area.width * area.height];
        for outlined in &glyphs {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, value| {
                let x = px as i64 + bounds.min.x as i64;
                let y = py as i64 + bounds.min.y as i64;
                if let Some(idx) = area.index(x, y) {
                    coverage[idx] = coverage[idx].max(value.clamp(0.0, 1.0));
                }
            });
        }

        let opacity = opacity.clamp(0.0, 1.0);
        for (idx, value) in coverage.into_iter().enumerate() {
            if value <= 0.0 {
                continue;
            }
            let x = (area.left + (idx % area.width) as i64) as u32;
            let y = (area.top + (idx / area.width) as i64) as u32;
            let pixel = canvas.get_pixel_mut(x, y);
            *pixel = blend_over(*pixel, color, value * opacity);
        }
    }
}

/// Source-over blend of `color` at `alpha` onto `bottom`.
fn blend_over(bottom: Rgba<u8>, color: Color, alpha: f32) -> Rgba<u8> {
    let bottom_alpha = bottom[3] as f32 / 255.0;
    let out_alpha = alpha + bottom_alpha * (1.0 - alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }
    let mix = |top: u8, under: u8| -> u8 {
        let value = (top as f32 * alpha + under as f32 * bottom_alpha * (1.0 - alpha)) / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(color.r, bottom[0]),
        mix(color.g, bottom[1]),
        mix(color.b, bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
