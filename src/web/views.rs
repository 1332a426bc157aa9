use chrono::{DateTime, Utc};

use super::flash::take_flash_message;
use super::prelude::*;
use crate::constants::{MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::generation::GenerationResult;
use crate::settings::Complexity;
use crate::share::{self, InvalidShareData, ShareToken};
use crate::watermark::Anchor;
use crate::workspace::Workspace;

#[derive(Clone, Debug)]
pub(crate) struct SelectOption {
    pub(crate) value: &'static str,
    pub(crate) label: &'static str,
    pub(crate) selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct HistoryRow {
    pub(crate) index: usize,
    pub(crate) prompt: String,
    pub(crate) saved_at: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    theme: &'static str,
    next_theme: &'static str,
    has_flash: bool,
    flash_message: String,
    flash_class: String,
    has_image: bool,
    image_name: String,
    image_size: String,
    preview_url: String,
    render_failed: bool,
    watermark_enabled: bool,
    watermark_text: String,
    watermark_font_size: u32,
    watermark_color: String,
    watermark_opacity: String,
    anchors: Vec<SelectOption>,
    min_font_size: u32,
    max_font_size: u32,
    style: String,
    mood: String,
    complexities: Vec<SelectOption>,
    has_result: bool,
    prompt: String,
    negative_prompt: String,
    keywords: Vec<String>,
    share_url: String,
    history: Vec<HistoryRow>,
    fetching: bool,
    generating: bool,
}

#[derive(Deserialize)]
pub(crate) struct RootQuery {
    share: Option<String>,
}

fn saved_at(entry: &GenerationResult) -> String {
    entry
        .timestamp
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|when| when.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default()
}

fn share_link(state: &AppState, ws: &Workspace) -> String {
    let Some(result) = ws.result() else {
        return String::new();
    };
    let token = share::encode(result, ws.settings());
    match share::share_url(&state.public_url, &token) {
        Ok(url) => url,
        Err(err) => {
            warn!("Can't build share link from {}: {err}", state.public_url);
            String::new()
        }
    }
}

impl HomeTemplate {
    fn build(state: &AppState, ws: &mut Workspace, history: &[GenerationResult]) -> Self {
        let flash = take_flash_message(ws);
        let watermark = ws.watermark().clone();
        let settings = ws.settings().clone();
        let result = ws.result().cloned();
        let (has_image, image_name, image_size) = match ws.source() {
            Some(image) => (
                true,
                image.filename().unwrap_or("image").to_string(),
                format!("{} × {}", image.width(), image.height()),
            ),
            None => (false, String::new(), String::new()),
        };
        let theme = ws.theme();

        Self {
            theme: theme.as_str(),
            next_theme: theme.toggled().as_str(),
            has_flash: flash.is_some(),
            flash_message: flash
                .as_ref()
                .map(|flash| flash.text.clone())
                .unwrap_or_default(),
            flash_class: flash
                .as_ref()
                .map(|flash| flash.class.to_string())
                .unwrap_or_default(),
            has_image,
            image_name,
            image_size,
            preview_url: format!("/preview?rev={}", ws.revision()),
            render_failed: ws.render_failed(),
            watermark_enabled: watermark.enabled,
            watermark_text: watermark.text,
            watermark_font_size: watermark.font_size,
            watermark_color: watermark.color.to_hex(),
            watermark_opacity: format!("{:.2}", watermark.opacity),
            anchors: Anchor::ALL
                .into_iter()
                .map(|anchor| SelectOption {
                    value: anchor.as_str(),
                    label: anchor.label(),
                    selected: anchor == watermark.anchor,
                })
                .collect(),
            min_font_size: MIN_FONT_SIZE,
            max_font_size: MAX_FONT_SIZE,
            style: settings.style,
            mood: settings.mood,
            complexities: Complexity::ALL
                .into_iter()
                .map(|level| SelectOption {
                    value: level.as_str(),
                    label: level.label(),
                    selected: level == settings.complexity,
                })
                .collect(),
            has_result: result.is_some(),
            keywords: result
                .as_ref()
                .map(GenerationResult::keyword_list)
                .unwrap_or_default(),
            prompt: result
                .as_ref()
                .map(|result| result.prompt.clone())
                .unwrap_or_default(),
            negative_prompt: result
                .map(|result| result.negative_prompt)
                .unwrap_or_default(),
            share_url: share_link(state, ws),
            history: history
                .iter()
                .enumerate()
                .map(|(index, entry)| HistoryRow {
                    index,
                    prompt: entry.prompt.clone(),
                    saved_at: saved_at(entry),
                })
                .collect(),
            fetching: state.is_fetching(),
            generating: state.is_generating(),
        }
    }
}

/// handles the / GET
///
/// A `share` parameter is applied to the session and then dropped from the
/// address bar with a redirect, so a reload doesn't apply it again.
pub(crate) async fn root_handler(
    State(state): State<AppState>,
    Query(query): Query<RootQuery>,
) -> Result<Response, PromptVisionError> {
    if let Some(token) = query.share.filter(|token| !token.trim().is_empty()) {
        let mut ws = state.workspace.write().await;
        match ws.apply_share(&ShareToken::new(token)) {
            Ok(()) => info!("Applied shared result"),
            Err(err) => {
                warn!("{err}");
                ws.set_notice(Notice::error(InvalidShareData::USER_MESSAGE));
            }
        }
        return Ok(Redirect::to("/").into_response());
    }

    let history = state.history.entries().await;
    let mut ws = state.workspace.write().await;
    Ok(HomeTemplate::build(&state, &mut ws, &history).into_response())
}
