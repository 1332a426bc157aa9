use super::prelude::*;

/// Sends the current preview to the generator.
///
/// Only one generation runs at a time; a second request gets `409`. On
/// failure the previous result stays on screen next to the error message.
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
) -> Result<Redirect, PromptVisionError> {
    let _guard = InFlightGuard::try_acquire(&state.generating)
        .ok_or_else(|| PromptVisionError::Conflict("generation".to_string()))?;

    let (source_id, settings, has_source) = {
        let ws = state.workspace.read().await;
        (ws.source_id(), ws.settings().clone(), ws.source().is_some())
    };
    if !has_source {
        state
            .workspace
            .write()
            .await
            .set_notice(Notice::error("Please upload an image first."));
        return Ok(Redirect::to("/"));
    }

    let Some(preview) = refresh_preview(&state.workspace, state.font.clone()).await else {
        state.workspace.write().await.set_notice(Notice::error(
            "The image preview could not be rendered. Try turning the watermark off.",
        ));
        return Ok(Redirect::to("/"));
    };

    let started = std::time::Instant::now();
    let generated = state.generator.generate(&preview.image, &settings).await;
    let mut ws = state.workspace.write().await;
    match generated {
        Ok(result) => {
            info!(
                "Generated prompt in {}ms ({} keywords)",
                started.elapsed().as_millis(),
                result.keyword_list().len()
            );
            ws.set_result_for(source_id, result);
        }
        Err(err) => {
            warn!("Generation failed: {err}");
            ws.set_notice(Notice::error(err.user_message()));
        }
    }
    Ok(Redirect::to("/"))
}

/// Saves the shown result at the top of the history.
pub(crate) async fn save_history_handler(
    State(state): State<AppState>,
) -> Result<Redirect, PromptVisionError> {
    let result = state.workspace.read().await.result().cloned();
    let Some(result) = result else {
        state
            .workspace
            .write()
            .await
            .set_notice(Notice::error("There is no prompt to save yet."));
        return Ok(Redirect::to("/"));
    };
    let entries = state.history.save(result).await;
    debug!("History now holds {} entries", entries.len());
    state
        .workspace
        .write()
        .await
        .set_notice(Notice::success("Saved to history."));
    Ok(Redirect::to("/"))
}

/// Shows a history entry as the current result.
pub(crate) async fn select_history_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Redirect, PromptVisionError> {
    let entry = state
        .history
        .get(index)
        .await
        .ok_or_else(|| PromptVisionError::NotFound(format!("/history/{index}")))?;
    state.workspace.write().await.set_result(entry);
    Ok(Redirect::to("/"))
}
