//! The watermark compositor: source image + config in, new image out.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use super::{WatermarkConfig, WatermarkError, WatermarkFont};
use crate::constants::JPEG_QUALITY;
use crate::raster::{RasterFormat, RasterImage};

/// Composites `config` onto `source`.
///
/// An inactive config (disabled or empty text) returns `source` itself. An
/// active one decodes the source onto an RGBA canvas of the same size, draws
/// the text and re-encodes in the source's format. All intermediate buffers
/// are dropped before returning, on every path.
pub fn compose(
    source: &RasterImage,
    config: &WatermarkConfig,
    font: Option<&WatermarkFont>,
) -> Result<RasterImage, WatermarkError> {
    if !config.is_active() {
        return Ok(source.clone());
    }
    let font = font.ok_or_else(|| {
        WatermarkError::RenderUnavailable("no watermark font is loaded".to_string())
    })?;

    let mut canvas = decode_canvas(source)?;
    let placement = config
        .anchor
        .resolve(canvas.width(), canvas.height(), config.font_size);
    font.draw(
        &mut canvas,
        &config.text,
        config.font_size as f32,
        config.color,
        config.opacity,
        placement,
    );
    debug!(
        anchor = %config.anchor,
        x = placement.x,
        y = placement.y,
        "Drew watermark on {}x{} {}",
        canvas.width(),
        canvas.height(),
        source.mime_type()
    );

    let bytes = encode_canvas(DynamicImage::ImageRgba8(canvas), source.format())?;
    let mut output = RasterImage::from_parts(bytes, source.format(), source.width(), source.height());
    if let Some(filename) = source.filename() {
        output = output.with_filename(filename);
    }
    Ok(output)
}

fn decode_canvas(source: &RasterImage) -> Result<RgbaImage, WatermarkError> {
    let decoded = image::load_from_memory_with_format(source.bytes(), source.format().image_format())
        .map_err(|err| WatermarkError::RenderUnavailable(format!("cannot decode source: {err}")))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(WatermarkError::RenderUnavailable(
            "source image has no pixels".to_string(),
        ));
    }
    Ok(decoded.to_rgba8())
}

fn encode_canvas(canvas: DynamicImage, format: RasterFormat) -> Result<Vec<u8>, WatermarkError> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        RasterFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            canvas
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| WatermarkError::RenderUnavailable(format!("JPEG encode failed: {e}")))?;
        }
        RasterFormat::Png => {
            canvas
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| WatermarkError::RenderUnavailable(format!("PNG encode failed: {e}")))?;
        }
        RasterFormat::WebP => {
            // the image crate only encodes lossless WebP
            let encoder = WebPEncoder::new_lossless(&mut buf);
            canvas
                .write_with_encoder(encoder)
                .map_err(|e| WatermarkError::RenderUnavailable(format!("WebP encode failed: {e}")))?;
        }
    }
    Ok(buf.into_inner())
}
