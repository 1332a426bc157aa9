//! Share links: a result and its settings packed into one URL-safe token.
//!
//! The token is the JSON document `{"data": <result>, "settings": <settings>}`
//! in URL-safe base64 without padding, so it can sit in a query parameter
//! as-is. Decoding also accepts standard base64 so links made by `btoa`
//! keep working.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::SHARE_PARAM;
use crate::generation::GenerationResult;
use crate::settings::GenerationSettings;

/// An encoded share payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Wraps a token taken from a URL.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A share token that could not be turned back into state.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidShareData(pub String);

impl InvalidShareData {
    /// Message shown to the user.
    pub const USER_MESSAGE: &'static str = "The shared link appears to be invalid or corrupted.";
}

impl fmt::Display for InvalidShareData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid share data: {}", self.0)
    }
}

impl std::error::Error for InvalidShareData {}

#[derive(Serialize)]
struct SharePayloadRef<'a> {
    data: &'a GenerationResult,
    settings: &'a GenerationSettings,
}

#[derive(Deserialize)]
struct SharePayload {
    data: Option<GenerationResult>,
    settings: Option<GenerationSettings>,
}

/// Encodes a result and the settings that produced it.
pub fn encode(result: &GenerationResult, settings: &GenerationSettings) -> ShareToken {
    let payload = SharePayloadRef {
        data: result,
        settings,
    };
    // serializing plain strings and enums into a Vec cannot fail
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    ShareToken(general_purpose::URL_SAFE_NO_PAD.encode(json))
}

fn decode_bytes(token: &str) -> Result<Vec<u8>, InvalidShareData> {
    let token = token.trim();
    if token.is_empty() {
        return Err(InvalidShareData("empty token".to_string()));
    }
    let unpadded = token.trim_end_matches('=');
    general_purpose::URL_SAFE_NO_PAD
        .decode(unpadded)
        // query decoding turns a standard-alphabet '+' into a space
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(unpadded.replace(' ', "+")))
        .map_err(|err| InvalidShareData(format!("not base64: {err}")))
}

/// Decodes a token back into the result and settings it carries.
pub fn decode(token: &ShareToken) -> Result<(GenerationResult, GenerationSettings), InvalidShareData> {
    let json = decode_bytes(token.as_str())?;
    let payload: SharePayload = serde_json::from_slice(&json)
        .map_err(|err| InvalidShareData(format!("not a share payload: {err}")))?;
    match (payload.data, payload.settings) {
        (Some(data), _) if data.prompt.trim().is_empty() => {
            Err(InvalidShareData("missing prompt".to_string()))
        }
        (Some(data), Some(settings)) => Ok((data, settings)),
        (None, _) => Err(InvalidShareData("missing data".to_string())),
        (_, None) => Err(InvalidShareData("missing settings".to_string())),
    }
}

/// Builds `<base>?share=<token>`, replacing any existing query.
pub fn share_url(base: &str, token: &ShareToken) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair(SHARE_PARAM, token.as_str());
    Ok(url.to_string())
}

/// Extracts the `share` parameter from a URL's query string.
pub fn token_from_url(url: &str) -> Option<ShareToken> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == SHARE_PARAM)
        .map(|(_, value)| ShareToken::new(value.into_owned()))
        .filter(|token| !token.as_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Complexity;

    fn sample() -> (GenerationResult, GenerationSettings) {
        (
            GenerationResult {
                prompt: "A lighthouse at dusk, “storm” clouds & spray?".to_string(),
                negative_prompt: "blurry, text".to_string(),
                keywords: "moody, cinematic".to_string(),
                timestamp: Some(1_717_000_000_123),
            },
            GenerationSettings {
                style: "oil painting".to_string(),
                mood: "tense".to_string(),
                complexity: Complexity::HighlyDetailed,
            },
        )
    }

    #[test]
    fn round_trips() {
        let (result, settings) = sample();
        let token = encode(&result, &settings);
        assert_eq!(decode(&token).unwrap(), (result, settings));
    }

    #[test]
    fn round_trips_without_timestamp() {
        let (mut result, settings) = sample();
        result.timestamp = None;
        let token = encode(&result, &settings);
        let (decoded, _) = decode(&token).unwrap();
        assert_eq!(decoded.timestamp, None);
        assert_eq!(decoded, result);
    }

    #[test]
    fn token_alphabet_is_url_safe() {
        let (result, settings) = sample();
        let token = encode(&result, &settings);
        assert!(
            token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn accepts_standard_base64_tokens() {
        let json = r#"{"data":{"prompt":"p","negativePrompt":"","keywords":"k"},"settings":{"style":"","mood":"","complexity":"simple"}}"#;
        let token = ShareToken::new(general_purpose::STANDARD.encode(json));
        let (result, settings) = decode(&token).unwrap();
        assert_eq!(result.prompt, "p");
        assert_eq!(settings.complexity, Complexity::Simple);
    }

    #[test]
    fn rejects_missing_keys() {
        for json in [
            r#"{"data":{"prompt":"p"}}"#,
            r#"{"settings":{"complexity":"simple"}}"#,
            r#"{}"#,
            r#"{"data":{"prompt":""},"settings":{}}"#,
            r#"{"data":{"prompt":"   ","keywords":"k"},"settings":{"complexity":"simple"}}"#,
        ] {
            let token = ShareToken::new(general_purpose::URL_SAFE_NO_PAD.encode(json));
            assert!(decode(&token).is_err(), "accepted {json}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for token in ["", "!!!!", "bm90IGpzb24", "W10"] {
            assert!(decode(&ShareToken::new(token)).is_err(), "accepted {token}");
        }
    }

    #[test]
    fn share_url_round_trips_through_query() {
        let (result, settings) = sample();
        let token = encode(&result, &settings);
        let url = share_url("http://localhost:9000/?old=1#frag", &token).unwrap();
        assert!(url.starts_with("http://localhost:9000/?share="));
        assert!(!url.contains("old=1"));
        assert_eq!(token_from_url(&url), Some(token));
    }

    #[test]
    fn no_share_param_is_none() {
        assert_eq!(token_from_url("http://localhost:9000/?other=1"), None);
        assert_eq!(token_from_url("http://localhost:9000/?share="), None);
    }
}
