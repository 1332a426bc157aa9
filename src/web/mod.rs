//! HTTP front end: one page driving the session, plus a small JSON API.

use std::fmt;
use std::num::NonZeroU16;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::constants::MAX_UPLOAD_BYTES;
use crate::fetch::ImageFetcher;
use crate::generation::PromptGenerator;
use crate::history::HistoryStore;
use crate::storage::KeyValueStore;
use crate::theme::Theme;
use crate::watermark::WatermarkFont;
use crate::workspace::Workspace;

mod api;
mod editor;
mod flash;
mod generate;
mod images;
pub(crate) mod prelude;
mod views;

/// Marks an operation as running until dropped.
pub(crate) struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    /// Claims `flag`, or returns `None` when the operation is already running.
    pub(crate) fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub(crate) workspace: Arc<RwLock<Workspace>>,
    pub(crate) history: Arc<HistoryStore>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) generator: Arc<dyn PromptGenerator>,
    pub(crate) fetcher: Arc<dyn ImageFetcher>,
    pub(crate) font: Option<Arc<WatermarkFont>>,
    pub(crate) public_url: String,
    pub(crate) fetching: Arc<AtomicBool>,
    pub(crate) generating: Arc<AtomicBool>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("public_url", &self.public_url)
            .field("font_loaded", &self.font.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds the state for a fresh session.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        history: HistoryStore,
        theme: Theme,
        generator: Arc<dyn PromptGenerator>,
        fetcher: Arc<dyn ImageFetcher>,
        font: Option<WatermarkFont>,
        public_url: &str,
    ) -> Self {
        Self {
            workspace: Arc::new(RwLock::new(Workspace::new(theme))),
            history: Arc::new(history),
            store,
            generator,
            fetcher,
            font: font.map(Arc::new),
            public_url: public_url.to_string(),
            fetching: Arc::new(AtomicBool::new(false)),
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    pub(crate) fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }
}

pub(crate) fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(views::root_handler))
        .route("/static/styles.css", get(styles_handler))
        .route(
            "/image",
            post(editor::upload_image_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/image/url", post(editor::load_url_handler))
        .route("/preview", get(images::preview_handler))
        .route("/watermark", post(editor::watermark_handler))
        .route("/settings", post(editor::settings_handler))
        .route("/theme", post(editor::theme_handler))
        .route("/generate", post(generate::generate_handler))
        .route("/history/save", post(generate::save_history_handler))
        .route(
            "/history/{index}/select",
            post(generate::select_history_handler),
        )
        .route("/api/share", get(api::share_handler))
        .route("/api/history", get(api::history_handler))
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

/// Serves the app until the listener fails.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    state: AppState,
) -> Result<(), anyhow::Error> {
    let app = create_router().with_state(state);

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::header::{ETAG, IF_NONE_MATCH, LOCATION};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use image::ImageFormat;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::constants::{HISTORY_KEY, TEST_PUBLIC_URL, THEME_KEY};
    use crate::fetch::ImageFetchFailed;
    use crate::generation::{GenerationError, GenerationResult};
    use crate::raster::RasterImage;
    use crate::raster::tests::encoded;
    use crate::settings::{Complexity, GenerationSettings};
    use crate::share::{self, InvalidShareData, ShareToken};
    use crate::storage::MemoryStore;

    struct FakeGenerator {
        reply: Mutex<Option<Result<GenerationResult, GenerationError>>>,
        seen: Mutex<Vec<(String, GenerationSettings)>>,
    }

    impl FakeGenerator {
        fn replying(reply: Result<GenerationResult, GenerationError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PromptGenerator for FakeGenerator {
        async fn generate(
            &self,
            image: &RasterImage,
            settings: &GenerationSettings,
        ) -> Result<GenerationResult, GenerationError> {
            self.seen
                .lock()
                .unwrap()
                .push((image.mime_type().to_string(), settings.clone()));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(GenerationError::QuotaExceeded))
        }
    }

    struct FakeFetcher;

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<RasterImage, ImageFetchFailed> {
            if url.ends_with(".html") {
                return Err(ImageFetchFailed::NotAnImage(Some("text/html".to_string())));
            }
            Ok(RasterImage::from_bytes(encoded(32, 16, ImageFormat::Jpeg))
                .unwrap()
                .with_filename("remote.jpg"))
        }
    }

    struct Harness {
        state: AppState,
        store: Arc<MemoryStore>,
        generator: Arc<FakeGenerator>,
    }

    async fn setup_with(reply: Result<GenerationResult, GenerationError>) -> Harness {
        setup_on(MemoryStore::new(), reply).await
    }

    async fn setup_on(
        store: MemoryStore,
        reply: Result<GenerationResult, GenerationError>,
    ) -> Harness {
        let store = Arc::new(store);
        let history = HistoryStore::load(store.clone()).await;
        let generator = Arc::new(FakeGenerator::replying(reply));
        let state = AppState::new(
            store.clone(),
            history,
            Theme::Light,
            generator.clone(),
            Arc::new(FakeFetcher),
            WatermarkFont::embedded().ok(),
            TEST_PUBLIC_URL,
        );
        Harness {
            state,
            store,
            generator,
        }
    }

    async fn setup() -> Harness {
        setup_with(Ok(GenerationResult::new(
            "A red fox in snow",
            "blurry",
            "fox, winter",
        )))
        .await
    }

    async fn send(state: &AppState, request: Request<Body>) -> axum::response::Response {
        create_router()
            .with_state(state.clone())
            .oneshot(request)
            .await
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn upload_req(bytes: &[u8], filename: &str) -> Request<Body> {
        let boundary = "promptvisionboundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/image")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_body(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    async fn home(state: &AppState) -> String {
        let response = send(state, get_req("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        read_body(response).await
    }

    async fn upload_png(state: &AppState) {
        let response = send(state, upload_req(&encoded(200, 100, ImageFormat::Png), "cat.png")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn homepage_renders_empty_session() {
        let harness = setup().await;
        let body = home(&harness.state).await;
        assert!(body.contains("PromptVision"));
        assert!(body.contains("Upload an image"));
        assert!(!body.contains("Negative prompt"));
    }

    #[tokio::test]
    async fn styles_are_served() {
        let harness = setup().await;
        let response = send(&harness.state, get_req("/static/styles.css")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/css");
    }

    #[tokio::test]
    async fn share_link_applies_then_redirects() {
        let harness = setup().await;
        let settings = GenerationSettings {
            style: "ukiyo-e".to_string(),
            mood: "calm".to_string(),
            complexity: Complexity::Simple,
        };
        let token = share::encode(
            &GenerationResult::new("Waves under Fuji", "modern", "wave, print"),
            &settings,
        );
        let url = share::share_url(TEST_PUBLIC_URL, &token).unwrap();
        let path = url.trim_start_matches("http://localhost:9000");

        let response = send(&harness.state, get_req(path)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/");

        let body = home(&harness.state).await;
        assert!(body.contains("Waves under Fuji"));
        assert!(body.contains("ukiyo-e"));
        assert_eq!(
            harness.state.workspace.read().await.settings(),
            &settings
        );
    }

    #[tokio::test]
    async fn bad_share_link_shows_message_once() {
        let harness = setup().await;
        let response = send(&harness.state, get_req("/?share=bm90IGpzb24")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let body = home(&harness.state).await;
        assert!(body.contains(InvalidShareData::USER_MESSAGE));
        let body = home(&harness.state).await;
        assert!(!body.contains(InvalidShareData::USER_MESSAGE));
        assert!(harness.state.workspace.read().await.result().is_none());
    }

    #[tokio::test]
    async fn preview_needs_an_image() {
        let harness = setup().await;
        let response = send(&harness.state, get_req("/preview")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_then_preview_with_revalidation() {
        let harness = setup().await;
        upload_png(&harness.state).await;

        let response = send(&harness.state, get_req("/preview")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
        let etag = response.headers().get(ETAG).unwrap().clone();

        let request = Request::builder()
            .method("GET")
            .uri("/preview")
            .header(IF_NONE_MATCH, etag.clone())
            .body(Body::empty())
            .unwrap();
        let response = send(&harness.state, request).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        let response = send(
            &harness.state,
            post_form("/watermark", "enabled=on&text=Mine&anchor=center&font_size=20&color=%23ff0000&opacity=0.8"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = send(&harness.state, get_req("/preview")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(response.headers().get(ETAG).unwrap(), &etag);
    }

    #[tokio::test]
    async fn upload_of_non_image_keeps_previous_source() {
        let harness = setup().await;
        upload_png(&harness.state).await;
        let response = send(&harness.state, upload_req(b"<html></html>", "page.html")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let ws = harness.state.workspace.read().await;
        assert_eq!(ws.source().and_then(|s| s.filename()), Some("cat.png"));
    }

    #[tokio::test]
    async fn invalid_watermark_is_rejected() {
        let harness = setup().await;
        let response = send(
            &harness.state,
            post_form("/watermark", "text=x&anchor=upper-middle"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = send(&harness.state, post_form("/watermark", "font_size=huge")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn url_load_failure_keeps_source_and_explains() {
        let harness = setup().await;
        upload_png(&harness.state).await;

        let response = send(
            &harness.state,
            post_form("/image/url", "url=https%3A%2F%2Fexample.org%2Fpage.html"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let body = home(&harness.state).await;
        assert!(body.contains("did not return a valid image"));
        assert_eq!(
            harness
                .state
                .workspace
                .read()
                .await
                .source()
                .and_then(|s| s.filename()),
            Some("cat.png")
        );

        let response = send(
            &harness.state,
            post_form("/image/url", "url=https%3A%2F%2Fexample.org%2Fremote.jpg"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let ws = harness.state.workspace.read().await;
        assert_eq!(ws.source().map(|s| s.mime_type()), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn generate_without_image_asks_for_one() {
        let harness = setup().await;
        let response = send(&harness.state, post_form("/generate", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let body = home(&harness.state).await;
        assert!(body.contains("Please upload an image first."));
        assert!(harness.generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_uses_settings_and_shows_result() {
        let harness = setup().await;
        upload_png(&harness.state).await;
        let response = send(
            &harness.state,
            post_form("/settings", "style=pixel+art&mood=&complexity=highly-detailed"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = send(&harness.state, post_form("/generate", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let body = home(&harness.state).await;
        assert!(body.contains("A red fox in snow"));
        let seen = harness.generator.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "image/png");
        assert_eq!(seen[0].1.style, "pixel art");
        assert_eq!(seen[0].1.complexity, Complexity::HighlyDetailed);
    }

    #[tokio::test]
    async fn failed_generation_keeps_previous_result() {
        let harness = setup_with(Err(GenerationError::MalformedModelResponse(
            "no prompt".to_string(),
        )))
        .await;
        upload_png(&harness.state).await;
        harness
            .state
            .workspace
            .write()
            .await
            .set_result(GenerationResult::new("Earlier prompt", "", ""));

        send(&harness.state, post_form("/generate", "")).await;
        let body = home(&harness.state).await;
        assert!(body.contains("Earlier prompt"));
        assert!(body.contains("unexpected response format"));
    }

    #[tokio::test]
    async fn overlapping_generation_conflicts() {
        let harness = setup().await;
        upload_png(&harness.state).await;
        let _running = InFlightGuard::try_acquire(&harness.state.generating).unwrap();

        let response = send(&harness.state, post_form("/generate", "")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(harness.generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_flight_guard_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = InFlightGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(InFlightGuard::try_acquire(&flag).is_none());
        drop(guard);
        assert!(InFlightGuard::try_acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn history_save_dedupes_and_select_restores() {
        let harness = setup().await;
        upload_png(&harness.state).await;
        send(&harness.state, post_form("/generate", "")).await;

        for _ in 0..2 {
            let response = send(&harness.state, post_form("/history/save", "")).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
        }
        let response = send(&harness.state, get_req("/api/history")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let list: Vec<GenerationResult> = serde_json::from_str(&read_body(response).await).unwrap();
        assert_eq!(list.len(), 1);
        assert!(list[0].timestamp.is_some());
        assert!(harness.store.get(HISTORY_KEY).unwrap().contains("A red fox in snow"));

        upload_png(&harness.state).await;
        assert!(harness.state.workspace.read().await.result().is_none());
        let response = send(&harness.state, post_form("/history/0/select", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            harness
                .state
                .workspace
                .read()
                .await
                .result()
                .map(|r| r.prompt.clone())
                .as_deref(),
            Some("A red fox in snow")
        );

        let response = send(&harness.state, post_form("/history/7/select", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn api_share_round_trips() {
        let harness = setup().await;
        let response = send(&harness.state, get_req("/api/share")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let result = GenerationResult::new("Neon alley", "", "neon");
        harness.state.workspace.write().await.set_result(result.clone());
        let response = send(&harness.state, get_req("/api/share")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();

        let token = ShareToken::new(json["token"].as_str().unwrap());
        let (decoded, settings) = share::decode(&token).unwrap();
        assert_eq!(decoded, result);
        assert_eq!(settings, GenerationSettings::default());
        assert!(json["url"].as_str().unwrap().starts_with(TEST_PUBLIC_URL));
        assert_eq!(json["text"], "Neon alley");
    }

    #[tokio::test]
    async fn theme_toggle_persists() {
        let harness = setup().await;
        let response = send(&harness.state, post_form("/theme", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(harness.store.get(THEME_KEY).as_deref(), Some("dark"));
        assert!(home(&harness.state).await.contains("theme-dark"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_theme_toggles_store_final_theme() {
        let harness = setup_on(
            MemoryStore::new().delay_first_write(Duration::from_millis(100)),
            Ok(GenerationResult::new("p", "", "k")),
        )
        .await;

        let first = tokio::spawn({
            let state = harness.state.clone();
            async move { send(&state, post_form("/theme", "")).await.status() }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = send(&harness.state, post_form("/theme", "")).await;
        assert_eq!(second.status(), StatusCode::SEE_OTHER);
        assert_eq!(first.await.unwrap(), StatusCode::SEE_OTHER);

        let theme = harness.state.workspace.read().await.theme();
        assert_eq!(theme, Theme::Light);
        assert_eq!(harness.store.get(THEME_KEY).as_deref(), Some(theme.as_str()));
    }
}
