use std::fmt;

use serde::{Deserialize, Serialize};

/// A creative dimension the workflow can ask the child about.
///
/// Names outside the known set survive as [`PromptVariable::Other`] so that
/// stored prompt state never fails to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PromptVariable {
    Subject,
    SubjectAction,
    Texture,
    Material,
    Style,
    Lighting,
    Background,
    Era,
    Mood,
    ColorPalette,
    Other(String),
}

impl PromptVariable {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subject => "subject",
            Self::SubjectAction => "subject_action",
            Self::Texture => "texture",
            Self::Material => "material",
            Self::Style => "style",
            Self::Lighting => "lighting",
            Self::Background => "background",
            Self::Era => "era",
            Self::Mood => "mood",
            Self::ColorPalette => "color_palette",
            Self::Other(name) => name.as_str(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().replace('-', "_").as_str() {
            "subject" => Self::Subject,
            "subject_action" | "subjectaction" => Self::SubjectAction,
            "texture" => Self::Texture,
            "material" => Self::Material,
            "style" => Self::Style,
            "lighting" => Self::Lighting,
            "background" => Self::Background,
            "era" => Self::Era,
            "mood" => Self::Mood,
            "color_palette" | "colorpalette" => Self::ColorPalette,
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for PromptVariable {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<PromptVariable> for String {
    fn from(value: PromptVariable) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PromptVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping label shared by UI theming and prompt synthesis ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorCategory {
    Subject,
    Variable,
    Context,
}

impl ColorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Variable => "variable",
            Self::Context => "context",
        }
    }
}

impl From<String> for ColorCategory {
    /// Unrecognized labels fall back to `variable`, the same default
    /// [`color_category`] uses.
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "subject" => Self::Subject,
            "context" => Self::Context,
            _ => Self::Variable,
        }
    }
}

impl From<ColorCategory> for String {
    fn from(value: ColorCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variables surfaced to the child, in the order they are asked.
pub const VARIABLE_CATALOG: [PromptVariable; 5] = [
    PromptVariable::Texture,
    PromptVariable::Lighting,
    PromptVariable::Mood,
    PromptVariable::Background,
    PromptVariable::Style,
];

pub const DEFAULT_QUESTION_COUNT: usize = 4;

/// First `count` catalog entries; counts past the catalog size are clamped.
pub fn select_variables(count: usize) -> Vec<PromptVariable> {
    VARIABLE_CATALOG
        .iter()
        .take(count.min(VARIABLE_CATALOG.len()))
        .cloned()
        .collect()
}

pub fn color_category(variable: &PromptVariable) -> ColorCategory {
    match variable {
        PromptVariable::Subject | PromptVariable::SubjectAction => ColorCategory::Subject,
        PromptVariable::Texture | PromptVariable::Material | PromptVariable::Style => {
            ColorCategory::Variable
        }
        PromptVariable::Lighting
        | PromptVariable::Background
        | PromptVariable::Era
        | PromptVariable::Mood
        | PromptVariable::ColorPalette => ColorCategory::Context,
        PromptVariable::Other(_) => ColorCategory::Variable,
    }
}

/// Kid-friendly definition embedded in question-generation instructions.
pub fn variable_description(variable: &PromptVariable) -> &'static str {
    match variable {
        PromptVariable::Texture => {
            "how the subject feels to touch (smooth, rough, fluffy, metallic, etc.)"
        }
        PromptVariable::Lighting => {
            "what kind of light is in the scene (bright, dark, glowing, magical, etc.)"
        }
        PromptVariable::Mood => {
            "what emotion or feeling the subject has (happy, mysterious, exciting, etc.)"
        }
        PromptVariable::Background => {
            "where the subject is located (space, forest, city, underwater, etc.)"
        }
        PromptVariable::Style => {
            "what art style to use (cartoon, realistic, pixel art, watercolor, etc.)"
        }
        _ => "a creative choice",
    }
}

/// Static question used whenever generation fails for `variable`.
pub fn fallback_question(variable: &PromptVariable) -> &'static str {
    match variable {
        PromptVariable::Texture => {
            "What does it feel like to touch? Smooth, rough, fluffy, or something else?"
        }
        PromptVariable::Lighting => "What kind of light is shining? Bright, dark, glowing, or magical?",
        PromptVariable::Mood => "What feeling does it have? Happy, mysterious, exciting, or calm?",
        PromptVariable::Background => "Where is it? In space, a forest, a city, or somewhere else?",
        PromptVariable::Style => "What art style should we use? Cartoon, realistic, or pixel art?",
        _ => "Tell me more about your creation!",
    }
}
