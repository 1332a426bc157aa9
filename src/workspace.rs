//! The single editing session: source image, watermark, settings, the
//! current result and the derived preview.
//!
//! Every change to the source or the watermark bumps `revision` and drops the
//! preview. [`refresh_preview`] snapshots the inputs, composes off the async
//! runtime and only stores its output if nothing changed in the meantime, so
//! a slow composition that lost the race is simply discarded.

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::generation::GenerationResult;
use crate::raster::RasterImage;
use crate::settings::{GenerationSettings, InvalidSetting, SettingsPatch};
use crate::share::{self, InvalidShareData, ShareToken};
use crate::theme::Theme;
use crate::watermark::{WatermarkConfig, WatermarkError, WatermarkFont, WatermarkPatch, compose};

/// How a one-shot message should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Something worked.
    Success,
    /// Something the user asked for failed.
    Error,
}

/// A message shown once on the next page render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Text shown to the user.
    pub text: String,
    /// Presentation.
    pub level: NoticeLevel,
}

impl Notice {
    /// A failure message.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: NoticeLevel::Error,
        }
    }

    /// A confirmation message.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: NoticeLevel::Success,
        }
    }
}

/// A composed image and the inputs revision it was made from.
#[derive(Clone, Debug)]
pub struct Preview {
    /// The watermarked (or pass-through) image.
    pub image: RasterImage,
    /// Revision of the inputs.
    pub revision: u64,
    /// When composition finished.
    pub composed_at: SystemTime,
}

/// What a composition needs, captured under the lock.
#[derive(Clone, Debug)]
pub struct CompositionInput {
    /// Image to draw on.
    pub source: RasterImage,
    /// Watermark to draw.
    pub config: WatermarkConfig,
    /// Revision the inputs belong to.
    pub revision: u64,
}

/// Mutable session state; always accessed through a `RwLock`.
#[derive(Debug, Default)]
pub struct Workspace {
    source: Option<RasterImage>,
    source_id: u64,
    watermark: WatermarkConfig,
    settings: GenerationSettings,
    revision: u64,
    preview: Option<Preview>,
    failed_revision: Option<u64>,
    result: Option<GenerationResult>,
    notice: Option<Notice>,
    theme: Theme,
}

impl Workspace {
    /// An empty session using `theme`.
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            ..Self::default()
        }
    }

    /// The loaded image, if any.
    pub fn source(&self) -> Option<&RasterImage> {
        self.source.as_ref()
    }

    /// Identifies the loaded image; changes with every load.
    pub fn source_id(&self) -> u64 {
        self.source_id
    }

    /// Current watermark settings.
    pub fn watermark(&self) -> &WatermarkConfig {
        &self.watermark
    }

    /// Current generation settings.
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Revision of the compositor inputs.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The preview, if it matches the current inputs.
    pub fn preview(&self) -> Option<&Preview> {
        self.preview
            .as_ref()
            .filter(|preview| preview.revision == self.revision)
    }

    /// Whether composing the current inputs already failed.
    pub fn render_failed(&self) -> bool {
        self.failed_revision == Some(self.revision)
    }

    /// The result on display.
    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    /// Current theme.
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Switches the theme.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn invalidate_preview(&mut self) {
        self.revision += 1;
        self.preview = None;
    }

    /// Replaces the source image, clearing the result and any pending message.
    pub fn set_source(&mut self, image: RasterImage) {
        debug!(
            "New source image {:?} {}x{}",
            image.filename(),
            image.width(),
            image.height()
        );
        self.source = Some(image);
        self.source_id += 1;
        self.result = None;
        self.notice = None;
        self.invalidate_preview();
    }

    /// Applies a watermark patch; on error nothing changes.
    pub fn update_watermark(&mut self, patch: WatermarkPatch) -> Result<(), WatermarkError> {
        let next = self.watermark.apply_patch(patch)?;
        if next != self.watermark {
            self.watermark = next;
            self.invalidate_preview();
        }
        Ok(())
    }

    /// Applies a settings patch; on error nothing changes.
    pub fn apply_settings(&mut self, patch: SettingsPatch) -> Result<(), InvalidSetting> {
        self.settings = self.settings.apply_patch(patch)?;
        Ok(())
    }

    /// Shows `result`.
    pub fn set_result(&mut self, result: GenerationResult) {
        self.result = Some(result);
    }

    /// Shows `result` only if it was generated from the image still loaded.
    pub fn set_result_for(&mut self, source_id: u64, result: GenerationResult) -> bool {
        if source_id != self.source_id {
            debug!("Dropping result for replaced image {source_id}");
            return false;
        }
        self.set_result(result);
        true
    }

    /// Restores the result and settings carried by a share token.
    ///
    /// A token that does not decode leaves the session untouched.
    pub fn apply_share(&mut self, token: &ShareToken) -> Result<(), InvalidShareData> {
        let (result, settings) = share::decode(token)?;
        self.result = Some(result);
        self.settings = settings;
        Ok(())
    }

    /// Queues a message for the next render, replacing any earlier one.
    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Removes and returns the queued message.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// The inputs to compose, when a loaded source has no usable preview.
    pub fn composition_input(&self) -> Option<CompositionInput> {
        if self.preview().is_some() || self.render_failed() {
            return None;
        }
        self.source.as_ref().map(|source| CompositionInput {
            source: source.clone(),
            config: self.watermark.clone(),
            revision: self.revision,
        })
    }

    /// Stores a composed image if `revision` is still current.
    pub fn store_preview(&mut self, revision: u64, image: RasterImage) -> Option<Preview> {
        if revision != self.revision {
            debug!(
                "Discarding stale preview for revision {revision}, now at {}",
                self.revision
            );
            return None;
        }
        let preview = Preview {
            image,
            revision,
            composed_at: SystemTime::now(),
        };
        self.preview = Some(preview.clone());
        Some(preview)
    }

    /// Records that `revision` could not be composed.
    pub fn mark_render_failed(&mut self, revision: u64) {
        if revision == self.revision {
            self.failed_revision = Some(revision);
            self.preview = None;
        }
    }
}

/// Returns the preview for the current inputs, composing it if needed.
///
/// `None` means there is no preview: either no image is loaded, rendering is
/// unavailable, or the inputs changed while composing.
pub async fn refresh_preview(
    workspace: &RwLock<Workspace>,
    font: Option<Arc<WatermarkFont>>,
) -> Option<Preview> {
    let input = {
        let ws = workspace.read().await;
        if let Some(preview) = ws.preview() {
            return Some(preview.clone());
        }
        ws.composition_input()?
    };

    let revision = input.revision;
    let composed = tokio::task::spawn_blocking(move || {
        compose(&input.source, &input.config, font.as_deref())
    })
    .await;

    match composed {
        Ok(Ok(image)) => workspace.write().await.store_preview(revision, image),
        Ok(Err(err)) => {
            warn!("Preview for revision {revision} unavailable: {err}");
            workspace.write().await.mark_render_failed(revision);
            None
        }
        Err(err) => {
            error!("Watermark task failed: {err}");
            workspace.write().await.mark_render_failed(revision);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::tests::encoded;
    use crate::settings::Complexity;
    use image::ImageFormat;

    fn png(width: u32, height: u32) -> RasterImage {
        RasterImage::from_bytes(encoded(width, height, ImageFormat::Png))
            .unwrap()
            .with_filename("photo.png")
    }

    fn enable_watermark() -> WatermarkPatch {
        WatermarkPatch {
            enabled: Some(true),
            text: Some("Mark".to_string()),
            ..WatermarkPatch::default()
        }
    }

    fn font() -> Option<Arc<WatermarkFont>> {
        Some(Arc::new(WatermarkFont::embedded().unwrap()))
    }

    #[test]
    fn new_source_clears_result_and_notice() {
        let mut ws = Workspace::default();
        ws.set_result(GenerationResult::new("old", "", ""));
        ws.set_notice(Notice::error("boom"));
        let before = ws.revision();

        ws.set_source(png(10, 10));

        assert!(ws.result().is_none());
        assert!(ws.take_notice().is_none());
        assert!(ws.revision() > before);
        assert_eq!(ws.source().and_then(|s| s.filename()), Some("photo.png"));
    }

    #[test]
    fn invalid_watermark_patch_changes_nothing() {
        let mut ws = Workspace::default();
        let revision = ws.revision();
        let patch = WatermarkPatch {
            anchor: Some("somewhere".to_string()),
            text: Some("ignored".to_string()),
            ..WatermarkPatch::default()
        };
        assert!(ws.update_watermark(patch).is_err());
        assert_eq!(ws.watermark(), &WatermarkConfig::default());
        assert_eq!(ws.revision(), revision);
    }

    #[test]
    fn unchanged_watermark_keeps_revision() {
        let mut ws = Workspace::default();
        let revision = ws.revision();
        ws.update_watermark(WatermarkPatch::default()).unwrap();
        assert_eq!(ws.revision(), revision);
    }

    #[test]
    fn stale_preview_is_discarded() {
        let mut ws = Workspace::default();
        ws.set_source(png(10, 10));
        let input = ws.composition_input().unwrap();

        ws.update_watermark(enable_watermark()).unwrap();
        assert!(ws.store_preview(input.revision, input.source).is_none());
        assert!(ws.preview().is_none());
    }

    #[test]
    fn bad_share_leaves_state() {
        let mut ws = Workspace::default();
        ws.set_result(GenerationResult::new("kept", "", ""));
        assert!(ws.apply_share(&ShareToken::new("not-a-token")).is_err());
        assert_eq!(ws.result().map(|r| r.prompt.as_str()), Some("kept"));
        assert_eq!(ws.settings(), &GenerationSettings::default());
    }

    #[test]
    fn share_restores_result_and_settings() {
        let settings = GenerationSettings {
            style: "watercolor".to_string(),
            mood: String::new(),
            complexity: Complexity::Simple,
        };
        let token = share::encode(&GenerationResult::new("shared", "", "a, b"), &settings);
        let mut ws = Workspace::default();
        ws.apply_share(&token).unwrap();
        assert_eq!(ws.result().map(|r| r.prompt.as_str()), Some("shared"));
        assert_eq!(ws.settings(), &settings);
    }

    #[test]
    fn result_for_replaced_image_is_dropped() {
        let mut ws = Workspace::default();
        ws.set_source(png(10, 10));
        let generating_for = ws.source_id();
        ws.set_source(png(12, 12));
        assert!(!ws.set_result_for(generating_for, GenerationResult::new("late", "", "")));
        assert!(ws.result().is_none());
    }

    #[tokio::test]
    async fn refresh_without_source_is_none() {
        let ws = RwLock::new(Workspace::default());
        assert!(refresh_preview(&ws, font()).await.is_none());
    }

    #[tokio::test]
    async fn refresh_passes_through_when_disabled() {
        let ws = RwLock::new(Workspace::default());
        let source = png(40, 30);
        ws.write().await.set_source(source.clone());

        let preview = refresh_preview(&ws, None).await.unwrap();
        assert_eq!(preview.image.bytes(), source.bytes());
        assert_eq!(preview.revision, ws.read().await.revision());
    }

    #[tokio::test]
    async fn refresh_composes_and_caches() {
        let ws = RwLock::new(Workspace::default());
        {
            let mut guard = ws.write().await;
            guard.set_source(png(200, 100));
            guard.update_watermark(enable_watermark()).unwrap();
        }
        let first = refresh_preview(&ws, font()).await.unwrap();
        let second = refresh_preview(&ws, font()).await.unwrap();
        assert_ne!(first.image.bytes(), ws.read().await.source().unwrap().bytes());
        assert_eq!(first.composed_at, second.composed_at);
        assert_eq!((first.image.width(), first.image.height()), (200, 100));
    }

    #[tokio::test]
    async fn refresh_without_font_marks_failure() {
        let ws = RwLock::new(Workspace::default());
        {
            let mut guard = ws.write().await;
            guard.set_source(png(50, 50));
            guard.update_watermark(enable_watermark()).unwrap();
        }
        assert!(refresh_preview(&ws, None).await.is_none());
        let guard = ws.read().await;
        assert!(guard.render_failed());
        assert!(guard.composition_input().is_none());
    }
}
