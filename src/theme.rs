//! Light/dark theme preference.

use std::fmt;

use tracing::{error, warn};

use crate::constants::THEME_KEY;
use crate::storage::KeyValueStore;

/// Page color scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    /// Light background
    #[default]
    Light,
    /// Dark background
    Dark,
}

impl Theme {
    /// Stored name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parses a stored value; only `light` and `dark` are recognised.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Reads the stored theme, falling back to light.
    pub async fn load(store: &dyn KeyValueStore) -> Self {
        match store.read(THEME_KEY).await {
            Ok(Some(value)) => Self::from_stored(&value).unwrap_or_else(|| {
                warn!("Ignoring unknown stored theme {value:?}");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(err) => {
                error!("Failed to load theme: {err}");
                Self::default()
            }
        }
    }

    /// Writes the theme; failures are logged only.
    pub async fn persist(self, store: &dyn KeyValueStore) {
        if let Err(err) = store.write(THEME_KEY, self.as_str()).await {
            warn!("Failed to save theme: {err}");
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
