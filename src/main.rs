use std::sync::Arc;

use clap::Parser;
use promptvision::config::setup_logging;
use promptvision::fetch::RelayFetcher;
use promptvision::generation::gemini::GeminiClient;
use promptvision::history::HistoryStore;
use promptvision::storage::{DbStore, KeyValueStore};
use promptvision::theme::Theme;
use promptvision::watermark::WatermarkFont;
use promptvision::web::AppState;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = promptvision::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let db = match promptvision::db::connect_db(&cli.database_path).await {
        Ok(db) => db,
        Err(err) => {
            error!("Database connection error: {}", err);
            return;
        }
    };

    if let Err(err) = promptvision::db::migrations::Migrator::up(&db, None).await {
        error!("Database migration error: {}", err);
        return;
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(DbStore::new(db));
    let history = HistoryStore::load(store.clone()).await;
    let theme = Theme::load(store.as_ref()).await;

    let font = match WatermarkFont::load(cli.font_path.as_deref()) {
        Ok(font) => Some(font),
        Err(err) => {
            error!("Watermarking disabled: {}", err);
            None
        }
    };

    if cli.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set, prompt generation will fail until it is");
    }
    let generator = Arc::new(GeminiClient::new(
        &cli.gemini_endpoint,
        &cli.gemini_model,
        cli.gemini_api_key.clone(),
    ));
    let fetcher = Arc::new(RelayFetcher::new(&cli.image_relay));
    info!(
        "Using model {} and image relay {}",
        cli.gemini_model, cli.image_relay
    );

    let state = AppState::new(
        store,
        history,
        theme,
        generator,
        fetcher,
        font,
        &cli.share_base_url(),
    );

    if let Err(err) = promptvision::web::setup_server(&cli.listen_address, cli.port, state).await {
        error!("Application error: {}", err);
    }
}
