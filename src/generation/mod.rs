//! Prompt generation: the boundary with the external generative model.
//!
//! [`build_instruction`] turns [`GenerationSettings`] into the text sent next
//! to the image, and [`parse_reply`] validates the model's structured answer.
//! The transport lives behind [`PromptGenerator`] so the web layer can be
//! exercised without network access.

pub mod gemini;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::raster::RasterImage;
use crate::settings::{Complexity, GenerationSettings};

pub use gemini::GeminiClient;

/// A generated prompt and its companions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Main prompt, never empty.
    pub prompt: String,
    /// Terms to exclude.
    #[serde(default)]
    pub negative_prompt: String,
    /// Comma-separated stylistic keywords.
    #[serde(default)]
    pub keywords: String,
    /// Epoch millis of the last save to history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl GenerationResult {
    /// A fresh, unsaved result.
    pub fn new(
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
        keywords: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            keywords: keywords.into(),
            timestamp: None,
        }
    }

    /// Keywords split on commas, trimmed, empties dropped.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Why a generation request failed.
#[derive(Debug)]
pub enum GenerationError {
    /// No API key is configured.
    MissingApiKey,
    /// The request never got an HTTP response.
    Network(String),
    /// The service rejected the credentials.
    Unauthorized(u16),
    /// The service reported the usage quota is exhausted.
    QuotaExceeded,
    /// Any other non-success HTTP status.
    Service {
        /// HTTP status code
        status: u16,
        /// Response body, for logs
        body: String,
    },
    /// The reply did not contain the required fields.
    MalformedModelResponse(String),
}

impl GenerationError {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingApiKey | Self::Unauthorized(_) => {
                "The API key is invalid or missing. Please check the configuration."
            }
            Self::Network(_) => {
                "A network error occurred. Please check your connection and try again."
            }
            Self::QuotaExceeded => "The API usage limit has been reached. Please try again later.",
            Self::Service { .. } => "An unexpected error occurred. Please try again.",
            Self::MalformedModelResponse(_) => {
                "The AI returned an unexpected response format. Please try again."
            }
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "No generation API key configured"),
            Self::Network(msg) => write!(f, "Generation request failed: {msg}"),
            Self::Unauthorized(status) => write!(f, "Generation API rejected the key ({status})"),
            Self::QuotaExceeded => write!(f, "Generation API quota exceeded"),
            Self::Service { status, body } => {
                write!(f, "Generation API error {status}: {body}")
            }
            Self::MalformedModelResponse(msg) => {
                write!(f, "Unexpected response format, retry: {msg}")
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// Something that can turn an image and settings into a prompt.
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    /// Requests a prompt describing `image`.
    async fn generate(
        &self,
        image: &RasterImage,
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, GenerationError>;
}

const ANALYSIS_PREAMBLE: &str = r#"Analyze this image in depth and write a rich prompt that an AI image generator such as Midjourney or DALL-E could use to recreate it. Take into account:
- Scene composition: how the elements are arranged (rule of thirds, symmetry, leading lines).
- Dominant colors and palette: the key colors and the overall scheme (monochromatic, analogous, complementary, vibrant, muted).
- Lighting: its character (soft, harsh, dramatic, cinematic, golden hour, studio).
- Artistic style: medium and style (photorealistic, oil painting, watercolor, 3D render, anime, cartoon, abstract).

Blend these observations into one cohesive, descriptive main prompt."#;

const REPLY_FORMAT: &str = r#"- Main Prompt: one cohesive paragraph covering subject, style, composition, lighting and color palette.
- Negative Prompt: terms to avoid, such as "blurry, text, watermark, ugly, deformed".
- Keywords: a comma-separated list of stylistic keywords.
Return a JSON object with exactly three keys: "prompt", "negativePrompt" and "keywords"."#;

/// Length directive for a complexity level.
pub fn complexity_directive(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => "brief and concise (about 1-2 sentences)",
        Complexity::Detailed => "detailed (a full paragraph)",
        Complexity::HighlyDetailed => {
            "highly detailed and evocative (multiple sentences, focusing on nuances)"
        }
    }
}

/// Builds the instruction sent alongside the image.
pub fn build_instruction(settings: &GenerationSettings) -> String {
    let mut constraints = Vec::new();
    if !settings.style.trim().is_empty() {
        constraints.push(format!("The desired style is \"{}\".", settings.style.trim()));
    }
    if !settings.mood.trim().is_empty() {
        constraints.push(format!("The desired mood is \"{}\".", settings.mood.trim()));
    }
    constraints.push(format!(
        "The prompt complexity should be {}.",
        complexity_directive(settings.complexity)
    ));

    format!(
        "{ANALYSIS_PREAMBLE}\n\nAdhere to the following user-defined parameters:\n- {}\n\n{REPLY_FORMAT}",
        constraints.join("\n- ")
    )
}

/// Structured-output schema with the three required string fields.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "prompt": {
                "type": "STRING",
                "description": "The main detailed, descriptive prompt for the AI image generator."
            },
            "negativePrompt": {
                "type": "STRING",
                "description": "A comma-separated list of keywords to exclude from the image generation (e.g., ugly, blurry, text, watermark, deformed)."
            },
            "keywords": {
                "type": "STRING",
                "description": "A comma-separated list of stylistic and descriptive keywords (e.g., photorealistic, cinematic lighting, 8k, detailed)."
            }
        },
        "required": ["prompt", "negativePrompt", "keywords"]
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    prompt: Option<String>,
    #[serde(default)]
    negative_prompt: Option<String>,
    #[serde(default)]
    keywords: Option<String>,
}

/// Parses the model's JSON text into a result.
///
/// Only `prompt` is mandatory; missing `negativePrompt`/`keywords` become
/// empty strings.
pub fn parse_reply(text: &str) -> Result<GenerationResult, GenerationError> {
    let reply: ModelReply = serde_json::from_str(text.trim())
        .map_err(|err| GenerationError::MalformedModelResponse(err.to_string()))?;
    let prompt = reply
        .prompt
        .map(|prompt| prompt.trim().to_string())
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| GenerationError::MalformedModelResponse("missing prompt".to_string()))?;
    Ok(GenerationResult::new(
        prompt,
        reply.negative_prompt.unwrap_or_default().trim(),
        reply.keywords.unwrap_or_default().trim(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_instruction_asks_for_brevity() {
        let settings = GenerationSettings {
            complexity: Complexity::Simple,
            ..Default::default()
        };
        let instruction = build_instruction(&settings);
        assert!(instruction.contains("brief and concise (about 1-2 sentences)"));
        assert!(!instruction.contains("The desired style"));
        assert!(instruction.contains("\"negativePrompt\""));
    }

    #[test]
    fn instruction_embeds_style_and_mood() {
        let settings = GenerationSettings {
            style: "oil painting".to_string(),
            mood: "melancholic".to_string(),
            complexity: Complexity::HighlyDetailed,
        };
        let instruction = build_instruction(&settings);
        assert!(instruction.contains("The desired style is \"oil painting\"."));
        assert!(instruction.contains("The desired mood is \"melancholic\"."));
        assert!(instruction.contains("highly detailed and evocative"));
    }

    #[test]
    fn schema_requires_three_fields() {
        let schema = response_schema();
        assert_eq!(
            schema["required"],
            json!(["prompt", "negativePrompt", "keywords"])
        );
    }

    #[test]
    fn parses_full_reply() {
        let result = parse_reply(
            r#" {"prompt":"A fox in snow","negativePrompt":"blurry","keywords":"winter, fox"} "#,
        )
        .unwrap();
        assert_eq!(result.prompt, "A fox in snow");
        assert_eq!(result.negative_prompt, "blurry");
        assert_eq!(result.keyword_list(), vec!["winter", "fox"]);
        assert_eq!(result.timestamp, None);
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let result = parse_reply(r#"{"prompt":"Only a prompt"}"#).unwrap();
        assert!(result.negative_prompt.is_empty());
        assert!(result.keyword_list().is_empty());
    }

    #[test]
    fn missing_or_blank_prompt_is_malformed() {
        for text in [
            r#"{"negativePrompt":"x","keywords":"y"}"#,
            r#"{"prompt":"   "}"#,
            "not json at all",
            "[]",
        ] {
            assert!(matches!(
                parse_reply(text),
                Err(GenerationError::MalformedModelResponse(_))
            ));
        }
    }

    #[test]
    fn keyword_list_skips_blanks() {
        let result = GenerationResult::new("p", "", " a, ,b ,, c");
        assert_eq!(result.keyword_list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn user_messages_distinguish_network_from_format() {
        let network = GenerationError::Network("dns".to_string()).user_message();
        let malformed = GenerationError::MalformedModelResponse("x".to_string()).user_message();
        assert_ne!(network, malformed);
        assert!(malformed.contains("unexpected response format"));
        assert!(network.contains("network"));
    }
}
