use axum::Json;
use serde::Serialize;

use super::prelude::*;
use crate::generation::GenerationResult;
use crate::share::{self, ShareToken};

const SHARE_TITLE: &str = "Prompt from PromptVision";

#[derive(Debug, Serialize)]
pub(crate) struct ShareResponse {
    token: ShareToken,
    url: String,
    title: &'static str,
    text: String,
}

/// Share link for the shown result.
pub(crate) async fn share_handler(
    State(state): State<AppState>,
) -> Result<Json<ShareResponse>, PromptVisionError> {
    let ws = state.workspace.read().await;
    let result = ws
        .result()
        .ok_or_else(|| PromptVisionError::NotFound("/api/share without a result".to_string()))?;
    let token = share::encode(result, ws.settings());
    let url = share::share_url(&state.public_url, &token)?;
    Ok(Json(ShareResponse {
        token,
        url,
        title: SHARE_TITLE,
        text: result.prompt.clone(),
    }))
}

pub(crate) async fn history_handler(State(state): State<AppState>) -> Json<Vec<GenerationResult>> {
    Json(state.history.entries().await)
}
