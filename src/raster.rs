//! Encoded raster images passed between the compositor, the web layer and the
//! generation client.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, ImageReader};

/// Encodings the application accepts and reproduces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterFormat {
    /// PNG
    Png,
    /// JPEG
    Jpeg,
    /// WebP (re-encoded losslessly)
    WebP,
}

impl RasterFormat {
    /// Maps an `image` crate format onto a supported encoding.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// The corresponding `image` crate format.
    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::WebP => ImageFormat::WebP,
        }
    }

    /// MIME type, eg `image/jpeg`.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }
}

/// Reasons raw bytes were not accepted as an image.
#[derive(Debug, PartialEq, Eq)]
pub enum RasterError {
    /// The bytes are not in a recognised image format.
    UnknownFormat,
    /// A recognised format that we cannot reproduce.
    UnsupportedFormat(String),
    /// Header or dimensions could not be read.
    Corrupt(String),
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFormat => write!(f, "Unrecognised image format"),
            Self::UnsupportedFormat(format) => {
                write!(f, "Unsupported image format: {format}")
            }
            Self::Corrupt(msg) => write!(f, "Unreadable image: {msg}"),
        }
    }
}

impl std::error::Error for RasterError {}

/// An immutable encoded image with known dimensions.
///
/// Bytes are shared, so cloning never copies pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    bytes: Arc<[u8]>,
    format: RasterFormat,
    width: u32,
    height: u32,
    filename: Option<String>,
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .field("filename", &self.filename)
            .finish()
    }
}

impl RasterImage {
    /// Sniffs the format and reads the dimensions of `bytes` without decoding pixels.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self, RasterError> {
        let bytes: Arc<[u8]> = bytes.into();
        let guessed = image::guess_format(&bytes).map_err(|_| RasterError::UnknownFormat)?;
        let format = RasterFormat::from_image_format(guessed)
            .ok_or_else(|| RasterError::UnsupportedFormat(format!("{guessed:?}")))?;
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes[..]), guessed)
            .into_dimensions()
            .map_err(|err| RasterError::Corrupt(err.to_string()))?;
        Ok(Self {
            bytes,
            format,
            width,
            height,
            filename: None,
        })
    }

    /// Builds an image from already-validated parts.
    pub(crate) fn from_parts(bytes: Vec<u8>, format: RasterFormat, width: u32, height: u32) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            width,
            height,
            filename: None,
        }
    }

    /// Attaches the original filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoding of [`Self::bytes`].
    pub fn format(&self) -> RasterFormat {
        self.format
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Original filename, when known.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}
