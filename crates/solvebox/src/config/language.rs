use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::harness::HarnessKind;
use crate::types::ResourceLimits;

/// Configuration for a sandboxed language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "JavaScript (Node.js)")
    pub name: String,

    /// Pre-built sandbox image holding only the language runtime
    pub image: ImageRef,

    /// Harness template used to wrap submitted source
    pub harness: HarnessKind,

    /// Command run inside the container; it must read the program from stdin.
    /// Empty means the image entrypoint.
    #[serde(default)]
    pub command: Vec<String>,

    /// Environment variables to set inside the container
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for this language (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Container image reference (e.g., "node:20-alpine")
///
/// Passed to the container runtime as a positional argument, so anything that
/// could be read as a flag or split into several arguments is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(image: &str) -> Result<Self, ConfigError> {
        if image.starts_with('-') || image.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidImage(image.to_owned()));
        }
        Ok(Self(image.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ImageRef::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"an image reference without whitespace or a leading '-'",
            )
        })
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
