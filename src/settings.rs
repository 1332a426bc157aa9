//! Generation settings and their validated partial updates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How elaborate the generated prompt should be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    /// One or two sentences
    Simple,
    /// A full paragraph
    #[default]
    Detailed,
    /// Several nuanced sentences
    HighlyDetailed,
}

impl Complexity {
    /// All levels in display order.
    pub const ALL: [Complexity; 3] = [Self::Simple, Self::Detailed, Self::HighlyDetailed];

    /// Wire name, eg `highly-detailed`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Detailed => "detailed",
            Self::HighlyDetailed => "highly-detailed",
        }
    }

    /// Human label for form options.
    pub fn label(self) -> &'static str {
        match self {
            Self::Simple => "Simple",
            Self::Detailed => "Detailed",
            Self::HighlyDetailed => "Highly Detailed",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unknown complexity name.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidSetting(pub String);

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid generation setting: {}", self.0)
    }
}

impl std::error::Error for InvalidSetting {}

impl FromStr for Complexity {
    type Err = InvalidSetting;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == value.trim())
            .ok_or_else(|| InvalidSetting(format!("unknown complexity '{value}'")))
    }
}

/// User preferences fed into the generation instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Desired artistic style, free text.
    #[serde(default)]
    pub style: String,
    /// Desired mood, free text.
    #[serde(default)]
    pub mood: String,
    /// Prompt length/detail.
    #[serde(default)]
    pub complexity: Complexity,
}

/// A partial update of [`GenerationSettings`]; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    /// New style.
    pub style: Option<String>,
    /// New mood.
    pub mood: Option<String>,
    /// New complexity name.
    pub complexity: Option<String>,
}

impl GenerationSettings {
    /// Validates `patch` and returns the resulting settings; `self` is untouched.
    pub fn apply_patch(&self, patch: SettingsPatch) -> Result<Self, InvalidSetting> {
        let complexity = match patch.complexity {
            Some(name) => name.parse()?,
            None => self.complexity,
        };
        Ok(Self {
            style: patch
                .style
                .map(|style| style.trim().to_string())
                .unwrap_or_else(|| self.style.clone()),
            mood: patch
                .mood
                .map(|mood| mood.trim().to_string())
                .unwrap_or_else(|| self.mood.clone()),
            complexity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_detailed_and_blank() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.complexity, Complexity::Detailed);
        assert!(settings.style.is_empty());
        assert!(settings.mood.is_empty());
    }

    #[test]
    fn complexity_wire_names() {
        assert_eq!(
            serde_json::to_string(&Complexity::HighlyDetailed).unwrap(),
            "\"highly-detailed\""
        );
        for level in Complexity::ALL {
            assert_eq!(level.as_str().parse::<Complexity>().unwrap(), level);
        }
        assert!("verbose".parse::<Complexity>().is_err());
    }

    #[test]
    fn patch_trims_and_keeps_unset_fields() {
        let settings = GenerationSettings {
            style: "watercolor".to_string(),
            mood: "calm".to_string(),
            complexity: Complexity::Simple,
        };
        let next = settings
            .apply_patch(SettingsPatch {
                mood: Some("  eerie ".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.style, "watercolor");
        assert_eq!(next.mood, "eerie");
        assert_eq!(next.complexity, Complexity::Simple);
    }

    #[test]
    fn patch_rejects_unknown_complexity() {
        let settings = GenerationSettings::default();
        let err = settings
            .apply_patch(SettingsPatch {
                complexity: Some("extreme".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("extreme"));
    }

    #[test]
    fn deserializes_partial_settings() {
        let settings: GenerationSettings = serde_json::from_str(r#"{"style":"anime"}"#).unwrap();
        assert_eq!(settings.style, "anime");
        assert_eq!(settings.complexity, Complexity::Detailed);
    }
}
