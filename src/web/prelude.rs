pub(crate) use crate::error::PromptVisionError;
pub(crate) use crate::web::{AppState, InFlightGuard};
pub(crate) use crate::workspace::{Notice, refresh_preview};
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, Path, Query, State};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use serde::Deserialize;
pub(crate) use tracing::{debug, info, warn};
