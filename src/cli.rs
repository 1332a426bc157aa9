//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

use crate::constants::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL, DEFAULT_IMAGE_RELAY};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "PROMPTVISION_DEBUG")]
    /// Enable debug logging. Env: PROMPTVISION_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "PROMPTVISION_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: PROMPTVISION_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "PROMPTVISION_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: PROMPTVISION_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(long, env = "PROMPTVISION_PUBLIC_URL")]
    /// Base URL used when building share links, eg `https://prompts.example.org/`.
    /// Defaults to `http://<listen_address>:<port>/`.
    /// Env: PROMPTVISION_PUBLIC_URL
    pub public_url: Option<String>,

    #[clap(
        long,
        short,
        default_value = "promptvision.sqlite",
        env = "PROMPTVISION_DATABASE_PATH"
    )]
    /// Path to the local state database, eg `/data/promptvision.sqlite`.
    /// Env: PROMPTVISION_DATABASE_PATH
    pub database_path: String,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Gemini API key. Generation fails with a configuration message when unset.
    pub gemini_api_key: Option<String>,
    #[clap(long, default_value = DEFAULT_GEMINI_MODEL, env = "PROMPTVISION_GEMINI_MODEL")]
    /// Gemini model used for prompt generation.
    pub gemini_model: String,
    #[clap(long, default_value = DEFAULT_GEMINI_ENDPOINT, env = "PROMPTVISION_GEMINI_ENDPOINT")]
    /// Base endpoint of the Gemini REST API.
    pub gemini_endpoint: String,

    #[clap(long, default_value = DEFAULT_IMAGE_RELAY, env = "PROMPTVISION_IMAGE_RELAY")]
    /// CORS-capable relay used to fetch images by URL; the target goes in its `url` parameter.
    pub image_relay: String,

    #[clap(long, env = "PROMPTVISION_FONT_PATH")]
    /// TTF/OTF font used for watermarks instead of the embedded bold face.
    pub font_path: Option<PathBuf>,
}

impl CliOptions {
    /// Base URL for share links, falling back to the listener address.
    pub fn share_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}/", self.listen_address, self.port),
        }
    }
}
