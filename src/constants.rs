//! Fixed values used across the app: storage keys, limits and service defaults.
//!

/// Storage key for the persisted theme.
pub const THEME_KEY: &str = "theme";

/// Storage key for the persisted prompt history.
pub const HISTORY_KEY: &str = "promptHistory";

/// Query parameter carrying a share token.
pub const SHARE_PARAM: &str = "share";

/// Fixed part of the watermark margin; the font size is added on top.
pub const WATERMARK_BASE_MARGIN: u32 = 10;

/// Smallest allowed watermark font size in pixels.
pub const MIN_FONT_SIZE: u32 = 8;

/// Largest allowed watermark font size in pixels.
pub const MAX_FONT_SIZE: u32 = 128;

/// JPEG quality used when re-encoding a watermarked image.
pub const JPEG_QUALITY: u8 = 90;

/// Default Gemini model for prompt generation.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default CORS relay for fetching images by URL.
pub const DEFAULT_IMAGE_RELAY: &str = "https://api.allorigins.win/raw";

/// Filename used when none can be derived from an image URL.
pub const FALLBACK_IMAGE_FILENAME: &str = "image-from-url.jpg";

/// Cache-Control value for the derived preview image.
pub const PREVIEW_CACHE_CONTROL: &str = "no-cache";

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[cfg(test)]
/// Base URL used in tests
pub const TEST_PUBLIC_URL: &str = "http://localhost:9000/";
