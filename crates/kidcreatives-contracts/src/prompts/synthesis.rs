//! Turns structured prompt state into the text sent to image generation.
//!
//! Both synthesizers are total: unexpected variables or categories produce
//! no clause instead of an error, since stored state is not schema-checked.

use super::state::PromptState;
use super::variables::{ColorCategory, PromptVariable};

/// Stand-in when the child left the intent statement blank.
pub const FALLBACK_INTENT: &str = "A creative artwork";

/// Original intent and style instructions kept apart for image-to-image
/// enhancement, so the reference composition is not restated as a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementPrompt {
    pub original_intent: String,
    pub style_instructions: String,
}

impl EnhancementPrompt {
    /// Prompt text handed to the image client alongside the reference image.
    pub fn combined(&self) -> String {
        if self.style_instructions.is_empty() {
            return self.original_intent.clone();
        }
        format!("{}\n\n{}", self.original_intent, self.style_instructions)
    }
}

/// Flattens state into `[intent], with [variables], [context], in a [style] style`.
///
/// Style always renders last through its own clause, whichever category
/// the entry carries.
pub fn synthesize_narrative_prompt(state: &PromptState) -> String {
    let intent = state.intent_statement.as_str();
    if intent.trim().is_empty() {
        return FALLBACK_INTENT.to_string();
    }
    if state.variables.is_empty() {
        return intent.to_string();
    }

    let mut prompt = intent.to_string();

    let textures: Vec<&str> = state
        .answers_in(ColorCategory::Variable)
        .map(|entry| entry.answer.as_str())
        .collect();
    if !textures.is_empty() {
        prompt.push_str(", with ");
        prompt.push_str(&textures.join(", "));
    }

    for entry in state.answers_in(ColorCategory::Context) {
        let clause = match entry.variable {
            PromptVariable::Lighting => format!(", in {} lighting", entry.answer),
            PromptVariable::Background => format!(", {}", entry.answer),
            PromptVariable::Era => format!(", set in {}", entry.answer),
            PromptVariable::Mood => format!(", feeling {}", entry.answer),
            _ => continue,
        };
        prompt.push_str(&clause);
    }

    if let Some(style) = state.find(&PromptVariable::Style) {
        prompt.push_str(&format!(", in a {} style", style.answer));
    }

    tidy_prompt(&prompt)
}

/// Splits state into what the drawing is and how to restyle it.
pub fn synthesize_enhancement_prompt(state: &PromptState) -> EnhancementPrompt {
    let original_intent = if state.intent_statement.trim().is_empty() {
        FALLBACK_INTENT.to_string()
    } else {
        state.intent_statement.clone()
    };

    let mut instructions = Vec::new();

    let textures: Vec<&str> = state
        .answers_in(ColorCategory::Variable)
        .map(|entry| entry.answer.as_str())
        .collect();
    if !textures.is_empty() {
        instructions.push(format!("Texture: {}", textures.join(", ")));
    }

    let labeled = [
        (PromptVariable::Lighting, "Lighting"),
        (PromptVariable::Mood, "Mood"),
        (PromptVariable::Background, "Background"),
        (PromptVariable::Style, "Art Style"),
    ];
    for (variable, label) in labeled {
        if let Some(entry) = state.find(&variable) {
            instructions.push(format!("{label}: {}", entry.answer));
        }
    }

    EnhancementPrompt {
        original_intent,
        style_instructions: instructions.join("\n"),
    }
}

/// Up to three meaningful words of the intent, for short labels.
pub fn extract_subject(intent_statement: &str) -> String {
    const STOP_WORDS: [&str; 8] = ["a", "an", "the", "is", "doing", "in", "on", "at"];
    let lowered = intent_statement.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word) && word.chars().count() > 2)
        .take(3)
        .collect();
    if words.is_empty() {
        return "creation".to_string();
    }
    words.join(" ")
}

fn tidy_prompt(prompt: &str) -> String {
    let mut tidy = prompt.split_whitespace().collect::<Vec<&str>>().join(" ");
    while tidy.contains(",,") || tidy.contains(", ,") {
        tidy = tidy.replace(", ,", ",").replace(",,", ",");
    }
    tidy.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::{PromptState, PromptVariableEntry};

    fn entry(variable: PromptVariable, answer: &str, category: ColorCategory) -> PromptVariableEntry {
        PromptVariableEntry {
            variable,
            answer: answer.to_string(),
            color_category: category,
        }
    }

    fn state(intent: &str, variables: Vec<PromptVariableEntry>) -> PromptState {
        PromptState {
            intent_statement: intent.to_string(),
            variables,
        }
    }

    #[test]
    fn robot_backflip_scenario() {
        let prompt = synthesize_narrative_prompt(&state(
            "A robot doing a backflip",
            vec![
                entry(PromptVariable::Texture, "metallic", ColorCategory::Variable),
                entry(PromptVariable::Lighting, "glowing", ColorCategory::Context),
                entry(PromptVariable::Style, "cartoon", ColorCategory::Context),
            ],
        ));
        assert_eq!(
            prompt,
            "A robot doing a backflip, with metallic, in glowing lighting, in a cartoon style"
        );
    }

    #[test]
    fn empty_variables_return_intent_unchanged() {
        assert_eq!(
            synthesize_narrative_prompt(&state("A happy whale", Vec::new())),
            "A happy whale"
        );
    }

    #[test]
    fn blank_intent_uses_fallback_phrase() {
        let with_vars = state(
            "   ",
            vec![entry(PromptVariable::Texture, "fuzzy", ColorCategory::Variable)],
        );
        assert_eq!(synthesize_narrative_prompt(&with_vars), FALLBACK_INTENT);
        assert_eq!(synthesize_narrative_prompt(&state("", Vec::new())), FALLBACK_INTENT);
    }

    #[test]
    fn style_renders_last_regardless_of_position() {
        let prompt = synthesize_narrative_prompt(&state(
            "A castle",
            vec![
                entry(PromptVariable::Style, "watercolor", ColorCategory::Context),
                entry(PromptVariable::Mood, "mysterious", ColorCategory::Context),
                entry(PromptVariable::Background, "on a cloud", ColorCategory::Context),
                entry(PromptVariable::Era, "the future", ColorCategory::Context),
            ],
        ));
        assert_eq!(
            prompt,
            "A castle, feeling mysterious, on a cloud, set in the future, in a watercolor style"
        );
        assert!(prompt.ends_with("in a watercolor style"));
    }

    #[test]
    fn style_in_variable_category_also_joins_with_clause() {
        let prompt = synthesize_narrative_prompt(&state(
            "A fox",
            vec![
                entry(PromptVariable::Style, "pixel art", ColorCategory::Variable),
                entry(PromptVariable::Texture, "soft", ColorCategory::Variable),
            ],
        ));
        assert_eq!(prompt, "A fox, with pixel art, soft, in a pixel art style");
    }

    #[test]
    fn unknown_context_variables_produce_no_clause() {
        let prompt = synthesize_narrative_prompt(&state(
            "A tree",
            vec![
                entry(PromptVariable::ColorPalette, "pastel", ColorCategory::Context),
                entry(PromptVariable::parse("weather"), "rainy", ColorCategory::Context),
                entry(PromptVariable::Subject, "oak", ColorCategory::Subject),
            ],
        ));
        assert_eq!(prompt, "A tree");
    }

    #[test]
    fn whitespace_and_double_commas_are_collapsed() {
        let prompt = synthesize_narrative_prompt(&state(
            "A  bus",
            vec![
                entry(PromptVariable::Texture, "shiny,", ColorCategory::Variable),
                entry(PromptVariable::Background, " , in the   city", ColorCategory::Context),
            ],
        ));
        assert_eq!(prompt, "A bus, with shiny, in the city");
    }

    #[test]
    fn enhancement_prompt_splits_intent_from_instructions() {
        let enhancement = synthesize_enhancement_prompt(&state(
            "A robot doing a backflip",
            vec![
                entry(PromptVariable::Style, "cartoon", ColorCategory::Context),
                entry(PromptVariable::Texture, "metallic", ColorCategory::Variable),
                entry(PromptVariable::Background, "in space", ColorCategory::Context),
                entry(PromptVariable::Lighting, "glowing", ColorCategory::Context),
                entry(PromptVariable::Mood, "brave", ColorCategory::Context),
            ],
        ));
        assert_eq!(enhancement.original_intent, "A robot doing a backflip");
        assert_eq!(
            enhancement.style_instructions,
            "Texture: metallic\nLighting: glowing\nMood: brave\nBackground: in space\nArt Style: cartoon"
        );
        assert!(!enhancement
            .style_instructions
            .contains(&enhancement.original_intent));
        assert_eq!(
            enhancement.combined(),
            format!(
                "A robot doing a backflip\n\n{}",
                enhancement.style_instructions
            )
        );
    }

    #[test]
    fn enhancement_mentions_style_once_per_value() {
        let enhancement = synthesize_enhancement_prompt(&state(
            "A fox",
            vec![entry(PromptVariable::Style, "pixel art", ColorCategory::Variable)],
        ));
        assert_eq!(
            enhancement.style_instructions,
            "Texture: pixel art\nArt Style: pixel art"
        );
        assert_eq!(
            enhancement
                .style_instructions
                .to_ascii_lowercase()
                .matches("style")
                .count(),
            1
        );
    }

    #[test]
    fn enhancement_defaults_for_blank_state() {
        let enhancement = synthesize_enhancement_prompt(&state(" ", Vec::new()));
        assert_eq!(enhancement.original_intent, FALLBACK_INTENT);
        assert_eq!(enhancement.style_instructions, "");
        assert_eq!(enhancement.combined(), FALLBACK_INTENT);
    }

    #[test]
    fn extract_subject_skips_stop_words() {
        assert_eq!(extract_subject("A robot doing a backflip in space"), "robot backflip space");
        assert_eq!(extract_subject("it is on"), "creation");
    }
}
