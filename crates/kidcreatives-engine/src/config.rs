use std::env;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const DRYRUN_API_KEY: &str = "dryrun";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY or GOOGLE_API_KEY not set")]
    MissingApiKey,
}

/// Connection settings shared by the question and image clients.
///
/// Construction fails without an API key, so a client can never exist
/// in a state where its first request would be rejected for lack of one.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        })
    }

    /// Reads `GEMINI_API_KEY` (or `GOOGLE_API_KEY`) plus optional
    /// `GEMINI_API_BASE`, `GEMINI_TEXT_MODEL` and `GEMINI_IMAGE_MODEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("GOOGLE_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key)?;
        if let Some(api_base) = non_empty("GEMINI_API_BASE") {
            config.api_base = api_base.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty("GEMINI_TEXT_MODEL") {
            config.text_model = model;
        }
        if let Some(model) = non_empty("GEMINI_IMAGE_MODEL") {
            config.image_model = model;
        }
        Ok(config)
    }

    /// Offline settings for the dryrun transport.
    pub fn dryrun() -> Self {
        Self {
            api_key: DRYRUN_API_KEY.to_string(),
            api_base: "dryrun://local".to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub fn text_endpoint(&self) -> String {
        self.endpoint_for_model(&self.text_model)
    }

    pub fn image_endpoint(&self) -> String {
        self.endpoint_for_model(&self.image_model)
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}
