use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Handshake,
    PromptBuilder,
    Generation,
    Refinement,
    Trophy,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Handshake,
        Phase::PromptBuilder,
        Phase::Generation,
        Phase::Refinement,
        Phase::Trophy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::PromptBuilder => "prompt-builder",
            Self::Generation => "generation",
            Self::Refinement => "refinement",
            Self::Trophy => "trophy",
        }
    }

    /// Phase a "complete" event advances to. Trophy wraps to Handshake.
    pub fn next(self) -> Phase {
        match self {
            Self::Handshake => Self::PromptBuilder,
            Self::PromptBuilder => Self::Generation,
            Self::Generation => Self::Refinement,
            Self::Refinement => Self::Trophy,
            Self::Trophy => Self::Handshake,
        }
    }

    /// Phase a "back" event returns to. Handshake has nowhere to go.
    pub fn previous(self) -> Phase {
        match self {
            Self::Handshake | Self::PromptBuilder => Self::Handshake,
            Self::Generation => Self::PromptBuilder,
            Self::Refinement => Self::Generation,
            Self::Trophy => Self::Refinement,
        }
    }

    pub fn parse(raw: &str) -> Option<Phase> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == normalized || phase.as_str().replace('-', "") == normalized)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data accumulated across one creative session.
///
/// Image fields hold base64 payloads. An empty string counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub original_image: Option<String>,
    pub image_mime_type: String,
    pub intent_statement: String,
    pub vision_analysis: Option<String>,
    #[serde(rename = "promptStateJSON")]
    pub prompt_state_json: Option<String>,
    pub generated_image: Option<String>,
    pub refined_image: Option<String>,
    pub edit_count: u32,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            original_image: None,
            image_mime_type: DEFAULT_IMAGE_MIME_TYPE.to_string(),
            intent_statement: String::new(),
            vision_analysis: None,
            prompt_state_json: None,
            generated_image: None,
            refined_image: None,
            edit_count: 0,
        }
    }
}

/// Names of the session fields `phase` needs but does not have.
pub fn missing_fields(phase: Phase, data: &SessionData) -> Vec<&'static str> {
    let required: Vec<(&'static str, &Option<String>)> = match phase {
        Phase::Handshake => Vec::new(),
        Phase::PromptBuilder => vec![
            ("originalImage", &data.original_image),
            ("visionAnalysis", &data.vision_analysis),
        ],
        Phase::Generation => vec![
            ("originalImage", &data.original_image),
            ("promptStateJSON", &data.prompt_state_json),
        ],
        Phase::Refinement => vec![
            ("originalImage", &data.original_image),
            ("generatedImage", &data.generated_image),
        ],
        Phase::Trophy => vec![
            ("originalImage", &data.original_image),
            ("refinedImage", &data.refined_image),
        ],
    };
    required
        .into_iter()
        .filter(|(_, value)| !is_present(value))
        .map(|(name, _)| name)
        .collect()
}

/// Guard checked on every attempt to enter `phase`.
pub fn can_enter(phase: Phase, data: &SessionData) -> bool {
    missing_fields(phase, data).is_empty()
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.is_empty())
}
