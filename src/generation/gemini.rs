//! Gemini `generateContent` client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::{
    GenerationError, GenerationResult, PromptGenerator, build_instruction, parse_reply,
    response_schema,
};
use crate::raster::RasterImage;
use crate::settings::GenerationSettings;

/// Talks to the Gemini REST API with structured JSON output.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    /// Builds a client for `model` at `endpoint`, eg `https://generativelanguage.googleapis.com/v1beta`.
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Request body carrying the image inline next to the instruction.
pub(crate) fn request_body(image: &RasterImage, instruction: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inline_data": {
                        "mime_type": image.mime_type(),
                        "data": general_purpose::STANDARD.encode(image.bytes()),
                    }
                },
                {"text": instruction}
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

/// Pulls the first text part out of a `generateContent` reply.
pub(crate) fn reply_text(body: &[u8]) -> Result<String, GenerationError> {
    let parsed: GenerateContentResponse = serde_json::from_slice(body)
        .map_err(|err| GenerationError::MalformedModelResponse(err.to_string()))?;
    if let Some(err) = parsed.error {
        return Err(GenerationError::MalformedModelResponse(format!(
            "service returned an error object: {err}"
        )));
    }
    parsed
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text)
        .ok_or_else(|| GenerationError::MalformedModelResponse("reply has no text".to_string()))
}

#[async_trait]
impl PromptGenerator for GeminiClient {
    async fn generate(
        &self,
        image: &RasterImage,
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::MissingApiKey)?;
        let instruction = build_instruction(settings);
        debug!(
            model = %self.model,
            mime = image.mime_type(),
            complexity = %settings.complexity,
            "Requesting prompt generation"
        );

        let resp = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&request_body(image, &instruction))
            .send()
            .await
            .map_err(|err| GenerationError::Network(err.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| GenerationError::Network(err.to_string()))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).to_string();
            error!("Gemini API error {status}: {body}");
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::Unauthorized(status.as_u16()),
                429 => GenerationError::QuotaExceeded,
                code => GenerationError::Service { status: code, body },
            });
        }

        let text = reply_text(&bytes)?;
        parse_reply(&text).inspect_err(|err| {
            warn!("Failed to parse structured reply ({err}): {text}");
        })
    }
}
