//! Loading images by URL through a CORS-capable relay.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::constants::{FALLBACK_IMAGE_FILENAME, MAX_UPLOAD_BYTES};
use crate::raster::RasterImage;

static UNSAFE_FILENAME_CHARS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]"));

/// Why an image could not be loaded from a URL.
#[derive(Debug, PartialEq, Eq)]
pub enum ImageFetchFailed {
    /// The submitted text is not an absolute http(s) URL.
    InvalidUrl(String),
    /// The relay could not be reached.
    Connectivity(String),
    /// The relay answered with a non-success status.
    Status(u16),
    /// The response is not an image.
    NotAnImage(Option<String>),
    /// The response is bigger than the byte limit it carries.
    TooLarge(usize),
}

impl ImageFetchFailed {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => "Please enter a valid http(s) image URL.".to_string(),
            Self::Connectivity(_) => "Could not load image. This may be due to a network error, an ad-blocker, or the image server being offline. Please check your connection and try another URL.".to_string(),
            Self::Status(status) => format!(
                "Failed to fetch image via proxy. The URL might be invalid or the image server is down. (Status: {status})"
            ),
            Self::NotAnImage(_) => "The URL did not return a valid image. It might be a webpage link or a broken URL.".to_string(),
            Self::TooLarge(limit) => format!(
                "The image at that URL is too large. Images can be at most {} MB.",
                limit / (1024 * 1024)
            ),
        }
    }
}

impl fmt::Display for ImageFetchFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "Invalid image URL: {url}"),
            Self::Connectivity(msg) => write!(f, "Image fetch failed: {msg}"),
            Self::Status(status) => write!(f, "Image relay returned status {status}"),
            Self::NotAnImage(Some(content_type)) => {
                write!(f, "URL returned {content_type}, not an image")
            }
            Self::NotAnImage(None) => write!(f, "URL did not return an image"),
            Self::TooLarge(limit) => write!(f, "Image is larger than {limit} bytes"),
        }
    }
}

impl std::error::Error for ImageFetchFailed {}

/// Fetches a remote image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads `url` and returns it as a named image.
    async fn fetch(&self, url: &str) -> Result<RasterImage, ImageFetchFailed>;
}

/// Derives a safe filename from the last path segment of `url`.
pub fn filename_from_url(url: &str) -> String {
    let Ok(url) = Url::parse(url) else {
        return FALLBACK_IMAGE_FILENAME.to_string();
    };
    let segment = url.path().rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return FALLBACK_IMAGE_FILENAME.to_string();
    }
    match UNSAFE_FILENAME_CHARS.as_ref() {
        Ok(re) => re.replace_all(segment, "_").into_owned(),
        Err(_) => FALLBACK_IMAGE_FILENAME.to_string(),
    }
}

/// Whether a `Content-Type` value declares an image.
pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// Appends `chunk` to `body` unless that would take it past `limit` bytes.
pub fn append_capped(
    body: &mut Vec<u8>,
    chunk: &[u8],
    limit: usize,
) -> Result<(), ImageFetchFailed> {
    if body.len().saturating_add(chunk.len()) > limit {
        return Err(ImageFetchFailed::TooLarge(limit));
    }
    body.extend_from_slice(chunk);
    Ok(())
}

/// Fetches images through a relay that takes the target in its `url` parameter.
#[derive(Clone, Debug)]
pub struct RelayFetcher {
    client: reqwest::Client,
    relay: String,
    max_bytes: usize,
}

impl RelayFetcher {
    /// Uses `relay`, eg `https://api.allorigins.win/raw`, with the upload size limit.
    pub fn new(relay: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay: relay.to_string(),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Overrides the largest body that will be read.
    pub fn with_max_bytes(self, max_bytes: usize) -> Self {
        Self { max_bytes, ..self }
    }

    /// The relay URL that fetches `target`.
    pub fn relay_url(&self, target: &str) -> Result<Url, ImageFetchFailed> {
        let parsed =
            Url::parse(target).map_err(|_| ImageFetchFailed::InvalidUrl(target.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageFetchFailed::InvalidUrl(target.to_string()));
        }
        Url::parse_with_params(&self.relay, &[("url", parsed.as_str())])
            .map_err(|err| ImageFetchFailed::InvalidUrl(format!("relay {}: {err}", self.relay)))
    }
}

#[async_trait]
impl ImageFetcher for RelayFetcher {
    async fn fetch(&self, url: &str) -> Result<RasterImage, ImageFetchFailed> {
        let relay_url = self.relay_url(url.trim())?;
        debug!("Fetching image via {relay_url}");

        let mut resp = self
            .client
            .get(relay_url)
            .send()
            .await
            .map_err(|err| ImageFetchFailed::Connectivity(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageFetchFailed::Status(status.as_u16()));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if !is_image_content_type(content_type.as_deref()) {
            return Err(ImageFetchFailed::NotAnImage(content_type));
        }
        if let Some(length) = resp.content_length()
            && length > self.max_bytes as u64
        {
            warn!("Refusing {url}: declared {length} bytes");
            return Err(ImageFetchFailed::TooLarge(self.max_bytes));
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|err| ImageFetchFailed::Connectivity(err.to_string()))?
        {
            append_capped(&mut bytes, &chunk, self.max_bytes)?;
        }

        let image = RasterImage::from_bytes(bytes).map_err(|err| {
            warn!("Fetched {url} declared {content_type:?} but did not decode: {err}");
            ImageFetchFailed::NotAnImage(content_type)
        })?;
        Ok(image.with_filename(filename_from_url(url.trim())))
    }
}
