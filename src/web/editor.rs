use axum::extract::Multipart;

use super::prelude::*;
use crate::raster::RasterImage;
use crate::settings::SettingsPatch;
use crate::watermark::WatermarkPatch;

const NOT_AN_IMAGE: &str = "The selected file is not a supported image. Please choose a PNG, JPEG or WebP file.";

#[derive(Deserialize)]
pub(crate) struct UrlForm {
    url: String,
}

/// Watermark controls as posted by the page; a missing checkbox means off.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct WatermarkForm {
    enabled: Option<String>,
    text: Option<String>,
    anchor: Option<String>,
    font_size: Option<String>,
    color: Option<String>,
    opacity: Option<String>,
}

fn parse_field<T: std::str::FromStr>(
    name: &str,
    value: Option<&str>,
) -> Result<Option<T>, PromptVisionError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| PromptVisionError::BadRequest(format!("invalid {name} '{raw}'"))),
    }
}

impl WatermarkForm {
    fn into_patch(self) -> Result<WatermarkPatch, PromptVisionError> {
        let enabled = matches!(self.enabled.as_deref(), Some("on" | "true" | "1"));
        Ok(WatermarkPatch {
            enabled: Some(enabled),
            text: self.text,
            anchor: self.anchor.filter(|anchor| !anchor.is_empty()),
            font_size: parse_field("font size", self.font_size.as_deref())?,
            color: self.color.filter(|color| !color.is_empty()),
            opacity: parse_field("opacity", self.opacity.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SettingsForm {
    style: Option<String>,
    mood: Option<String>,
    complexity: Option<String>,
}

impl From<SettingsForm> for SettingsPatch {
    fn from(form: SettingsForm) -> Self {
        SettingsPatch {
            style: form.style,
            mood: form.mood,
            complexity: form.complexity.filter(|name| !name.is_empty()),
        }
    }
}

/// Replaces the source with an uploaded file.
pub(crate) async fn upload_image_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, PromptVisionError> {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        upload = Some((bytes.to_vec(), filename));
    }
    let (bytes, filename) =
        upload.ok_or_else(|| PromptVisionError::BadRequest("missing image field".to_string()))?;

    {
        let mut ws = state.workspace.write().await;
        if bytes.is_empty() {
            ws.set_notice(Notice::error("Please choose an image file to upload."));
            return Ok(Redirect::to("/"));
        }
        match RasterImage::from_bytes(bytes) {
            Ok(image) => {
                let image = match filename.filter(|name| !name.is_empty()) {
                    Some(name) => image.with_filename(name),
                    None => image,
                };
                info!(
                    "Loaded upload {:?} ({})",
                    image.filename(),
                    image.mime_type()
                );
                ws.set_source(image);
            }
            Err(err) => {
                warn!("Rejected upload {filename:?}: {err}");
                ws.set_notice(Notice::error(NOT_AN_IMAGE));
            }
        }
    }

    refresh_preview(&state.workspace, state.font.clone()).await;
    Ok(Redirect::to("/"))
}

/// Replaces the source with an image fetched by URL.
pub(crate) async fn load_url_handler(
    State(state): State<AppState>,
    Form(form): Form<UrlForm>,
) -> Result<Redirect, PromptVisionError> {
    let _guard = InFlightGuard::try_acquire(&state.fetching)
        .ok_or_else(|| PromptVisionError::Conflict("image fetch".to_string()))?;

    let url = form.url.trim();
    if url.is_empty() {
        state
            .workspace
            .write()
            .await
            .set_notice(Notice::error("Please enter an image URL."));
        return Ok(Redirect::to("/"));
    }

    let fetched = state.fetcher.fetch(url).await;
    {
        let mut ws = state.workspace.write().await;
        match fetched {
            Ok(image) => {
                info!("Loaded {url} as {:?}", image.filename());
                ws.set_source(image);
            }
            Err(err) => {
                warn!("Loading {url} failed: {err}");
                ws.set_notice(Notice::error(err.user_message()));
            }
        }
    }

    refresh_preview(&state.workspace, state.font.clone()).await;
    Ok(Redirect::to("/"))
}

pub(crate) async fn watermark_handler(
    State(state): State<AppState>,
    Form(form): Form<WatermarkForm>,
) -> Result<Redirect, PromptVisionError> {
    let patch = form.into_patch()?;
    debug!("Watermark patch {patch:?}");
    state.workspace.write().await.update_watermark(patch)?;
    refresh_preview(&state.workspace, state.font.clone()).await;
    Ok(Redirect::to("/"))
}

pub(crate) async fn settings_handler(
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Result<Redirect, PromptVisionError> {
    state
        .workspace
        .write()
        .await
        .apply_settings(SettingsPatch::from(form))?;
    Ok(Redirect::to("/"))
}

/// Flips the theme and persists it.
///
/// The workspace stays locked until the write lands so toggles are stored
/// in the order they were applied.
pub(crate) async fn theme_handler(
    State(state): State<AppState>,
) -> Result<Redirect, PromptVisionError> {
    let mut ws = state.workspace.write().await;
    let theme = ws.theme().toggled();
    ws.set_theme(theme);
    theme.persist(state.store.as_ref()).await;
    Ok(Redirect::to("/"))
}
