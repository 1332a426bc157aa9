use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use httpdate::{fmt_http_date, parse_http_date};

use super::prelude::*;
use crate::constants::PREVIEW_CACHE_CONTROL;
use crate::workspace::Preview;

/// Attempts before giving up on a preview whose inputs keep changing.
const PREVIEW_ATTEMPTS: usize = 3;

/// Cache headers derived from a composed preview.
#[derive(Clone, Debug)]
pub(crate) struct PreviewCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: SystemTime,
}

impl PreviewCacheHeaders {
    /// Builds cache headers from the preview's revision and composition time.
    pub(crate) fn from_preview(preview: &Preview) -> Self {
        let secs = preview
            .composed_at
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs())
            .unwrap_or(0);
        // HTTP dates have whole-second precision
        let modified_at = UNIX_EPOCH + Duration::from_secs(secs);
        let etag = HeaderValue::from_str(&format!(
            "W/\"{}-{}-{}\"",
            preview.revision,
            preview.image.bytes().len(),
            secs
        ))
        .ok();
        let last_modified = HeaderValue::from_str(&fmt_http_date(modified_at)).ok();
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    /// Returns the ETag header value, if available.
    pub(crate) fn etag(&self) -> Option<&HeaderValue> {
        self.etag.as_ref()
    }

    /// Returns the Last-Modified header value, if available.
    pub(crate) fn last_modified(&self) -> Option<&HeaderValue> {
        self.last_modified.as_ref()
    }
}

/// Applies preview cache headers to a response builder.
pub(crate) fn apply_cache_headers(mut builder: Builder, cache: &PreviewCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, PREVIEW_CACHE_CONTROL);
    if let Some(etag) = cache.etag() {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = cache.last_modified() {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// Returns true when the request matches a not-modified response.
pub(crate) fn is_not_modified(headers: &HeaderMap, cache: &PreviewCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag().and_then(|value| value.to_str().ok())
                && value.split(',').any(|candidate| candidate.trim() == etag)
            {
                return true;
            }
        }
        return false;
    }

    if let Some(if_modified_since) = headers.get(IF_MODIFIED_SINCE)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && cache.modified_at <= since
    {
        return true;
    }

    false
}

/// Serves the derived image for the current session.
pub(crate) async fn preview_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PromptVisionError> {
    let mut preview = None;
    for _ in 0..PREVIEW_ATTEMPTS {
        preview = refresh_preview(&state.workspace, state.font.clone()).await;
        if preview.is_some() {
            break;
        }
        let ws = state.workspace.read().await;
        if ws.source().is_none() {
            return Err(PromptVisionError::NotFound("/preview".to_string()));
        }
        if ws.render_failed() {
            return Err(PromptVisionError::RenderUnavailable(format!(
                "revision {}",
                ws.revision()
            )));
        }
    }
    let preview = preview.ok_or_else(|| {
        PromptVisionError::RenderUnavailable("inputs kept changing".to_string())
    })?;

    let cache = PreviewCacheHeaders::from_preview(&preview);
    if is_not_modified(&headers, &cache) {
        let builder = apply_cache_headers(Response::builder().status(StatusCode::NOT_MODIFIED), &cache);
        return Ok(builder.body(Body::empty())?);
    }

    let builder = apply_cache_headers(Response::builder().status(StatusCode::OK), &cache)
        .header(CONTENT_TYPE, preview.image.mime_type());
    Ok(builder.body(Body::from(preview.image.bytes().to_vec()))?)
}
